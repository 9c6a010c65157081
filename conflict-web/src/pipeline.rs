//! Orchestration d'une requête : extraction → chargement → classification
//! → empaquetage
//!
//! Chaque requête travaille dans son propre [`RequestWorkspace`] :
//! - `uploads/<uuid>-*/` : répertoire temporaire supprimé au drop
//! - `results/<uuid>/` : conservé jusqu'au téléchargement (supprimé en cas
//!   d'échec, ou purgé par [`RequestWorkspace::sweep_stale`] une fois expiré)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vocation::VocationError;

use crate::report::ClassificationReport;

const UPLOADS_DIR: &str = "uploads";
const RESULTS_DIR: &str = "results";
const EXTRACT_DIR: &str = "extracted";

/// Erreurs du pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// L'archive envoyée ne contient aucun shapefile exploitable
    #[error("No valid shapefile found in the uploaded file")]
    Extraction,

    /// Échec après l'extraction (chargement, CRS, jointure, écriture)
    #[error("Processing failed: {0}")]
    Processing(#[from] VocationError),
}

impl From<io::Error> for PipelineError {
    fn from(err: io::Error) -> Self {
        Self::Processing(VocationError::Io(err))
    }
}

/// Répertoires de travail d'une requête
#[derive(Debug)]
pub struct RequestWorkspace {
    id: Uuid,
    upload: TempDir,
    result_dir: PathBuf,
}

impl RequestWorkspace {
    /// Crée les répertoires d'une nouvelle requête sous `work_root`
    pub fn create(work_root: &Path) -> io::Result<Self> {
        let id = Uuid::new_v4();

        let uploads = work_root.join(UPLOADS_DIR);
        fs::create_dir_all(&uploads)?;
        let upload = tempfile::Builder::new()
            .prefix(&format!("{}-", id))
            .tempdir_in(&uploads)?;

        let result_dir = Self::result_dir_for(work_root, &id);
        fs::create_dir_all(&result_dir)?;

        debug!(request_id = %id, upload = %upload.path().display(), "Workspace created");
        Ok(Self {
            id,
            upload,
            result_dir,
        })
    }

    /// Répertoire de résultat d'une requête
    pub fn result_dir_for(work_root: &Path, id: &Uuid) -> PathBuf {
        work_root.join(RESULTS_DIR).join(id.to_string())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn upload_dir(&self) -> &Path {
        self.upload.path()
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    /// Purge les répertoires de résultat plus vieux que `ttl`
    ///
    /// Retourne le nombre de répertoires supprimés. Une date de modification
    /// dans le futur compte comme récente.
    pub fn sweep_stale(work_root: &Path, ttl: Duration) -> usize {
        let results = work_root.join(RESULTS_DIR);
        let entries = match fs::read_dir(&results) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = %results.display(), error = %e, "Cannot list result directories");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.elapsed().ok())
                .is_some_and(|age| age >= ttl);
            if !expired || !path.is_dir() {
                continue;
            }
            match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(dir = %path.display(), error = %e, "Cannot remove stale result"),
            }
        }

        if removed > 0 {
            info!(removed, ttl_secs = ttl.as_secs(), "Stale results swept");
        }
        removed
    }

    /// Supprime le répertoire de résultat
    pub fn discard_result(&self) {
        if let Err(e) = fs::remove_dir_all(&self.result_dir) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(request_id = %self.id, error = %e, "Cannot remove result directory");
            }
        }
    }
}

/// Résultat d'une exécution réussie
#[derive(Debug)]
pub struct PipelineOutput {
    /// Archive `conflict.zip` dans le répertoire de résultat
    pub archive: PathBuf,
    pub report: ClassificationReport,
}

/// Pipeline de classification contre une référence fixe
#[derive(Debug, Clone)]
pub struct Pipeline {
    reference: PathBuf,
}

impl Pipeline {
    pub fn new(reference: impl Into<PathBuf>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// Exécute le pipeline sur une archive uploadée
    ///
    /// En cas d'échec, le répertoire de résultat est supprimé : aucune
    /// archive partielle n'est jamais servie.
    pub fn run(
        &self,
        upload_archive: &Path,
        workspace: &RequestWorkspace,
    ) -> Result<PipelineOutput, PipelineError> {
        let result = self.run_steps(upload_archive, workspace);
        if result.is_err() {
            workspace.discard_result();
        }
        result
    }

    fn run_steps(
        &self,
        upload_archive: &Path,
        workspace: &RequestWorkspace,
    ) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();
        let request_id = workspace.id().to_string();

        let extract_dir = workspace.upload_dir().join(EXTRACT_DIR);
        let shp = vocation::extract_shapefile(upload_archive, &extract_dir)
            .ok_or(PipelineError::Extraction)?;
        info!(request_id = %request_id, shapefile = %shp.display(), "Shapefile extracted");

        let upload = vocation::load(&shp)?;
        let reference = vocation::load(&self.reference)?;
        debug!(
            request_id = %request_id,
            upload_features = upload.len(),
            reference_features = reference.len(),
            "Datasets loaded"
        );

        let (result, stats) = vocation::classify_with_stats(&upload, &reference)?;
        let archive = vocation::package(
            &result,
            workspace.result_dir(),
            vocation::OUTPUT_BASE_NAME,
        )?;

        let mut report = ClassificationReport::new(&request_id);
        report.record_stats(&stats);
        report.set_duration(start.elapsed());
        info!(
            request_id = %request_id,
            archive = %archive.display(),
            "{}",
            report.summary()
        );

        Ok(PipelineOutput { archive, report })
    }
}
