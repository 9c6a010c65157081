//! Extraction des archives ZIP déposées par l'utilisateur

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::VocationError;

/// Extension du fichier géométrique principal d'un shapefile
pub const SHAPEFILE_EXTENSION: &str = "shp";

/// Préfixe des fichiers de métadonnées laissés par certains archiveurs (macOS)
const METADATA_PREFIX: &str = "._";

/// Extrait l'archive dans `dest` et retourne le premier shapefile trouvé.
///
/// Ne propage jamais d'erreur : une archive illisible est journalisée
/// et traitée comme une archive sans shapefile.
pub fn extract_shapefile(archive_path: &Path, dest: &Path) -> Option<PathBuf> {
    match try_extract_shapefile(archive_path, dest) {
        Ok(found) => {
            if found.is_none() {
                warn!(archive = %archive_path.display(), "No shapefile found in archive");
            }
            found
        }
        Err(e) => {
            warn!(archive = %archive_path.display(), error = %e, "Error extracting shapefile");
            None
        }
    }
}

/// Variante faillible de [`extract_shapefile`]
pub fn try_extract_shapefile(
    archive_path: &Path,
    dest: &Path,
) -> Result<Option<PathBuf>, VocationError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    std::fs::create_dir_all(dest)?;
    // Une entrée dont le chemin sortirait de `dest` fait échouer l'extraction
    archive.extract(dest)?;

    debug!(entries = archive.len(), dest = %dest.display(), "Archive extracted");

    Ok(find_shapefile(dest))
}

/// Parcourt récursivement `dir` (ordre des noms) et retourne le premier .shp
pub fn find_shapefile(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .find(|e| is_shapefile_candidate(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
}

/// Un candidat finit par .shp et n'est pas un fichier de métadonnées "._"
fn is_shapefile_candidate(name: &str) -> bool {
    if name.starts_with(METADATA_PREFIX) {
        return false;
    }
    Path::new(name)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case(SHAPEFILE_EXTENSION))
}
