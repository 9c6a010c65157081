//! # vocation
//!
//! Classification des conflits d'usage du sol : une couche d'occupation du
//! sol (shapefile) est croisée avec une couche de référence des vocations
//! des terres, et chaque polygone reçoit un niveau de conflit.
//!
//! ## Features
//!
//! - Extraction d'archives ZIP et détection du shapefile principal
//! - Lecture/écriture shapefile via le crate `shapefile`
//! - Jointure spatiale gauche (`intersects`) indexée par R-tree
//! - Reprojection PROJ (feature `reproject`, activée par défaut)
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//!
//! let shp = vocation::extract_shapefile(Path::new("upload.zip"), Path::new("work/"))
//!     .expect("no shapefile in archive");
//! let upload = vocation::load(&shp)?;
//! let reference = vocation::load(Path::new("static/vocation/vocation_Arauca.shp"))?;
//!
//! let result = vocation::classify(&upload, &reference)?;
//! let archive = vocation::package(&result, Path::new("out/"), "conflict")?;
//! println!("{}", archive.display());
//! ```

pub mod archive;
pub mod classify;
pub mod error;
pub mod loader;
pub mod package;
pub mod reproject;
pub mod rules;
pub mod types;

pub use archive::{extract_shapefile, try_extract_shapefile};
pub use classify::{classify, classify_with_stats, ClassifyStats};
pub use error::VocationError;
pub use loader::load;
pub use package::{package, write_dataset};
pub use rules::{conflict_level, level2_code, ConflictLevel, Vocation};
pub use types::{Crs, Dataset, Feature, Field, FieldKind, Value};

/// Nom de base des fichiers produits (`conflict.shp`, `conflict.zip`, ...)
pub const OUTPUT_BASE_NAME: &str = "conflict";
