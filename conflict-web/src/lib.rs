//! # conflict-web
//!
//! Service web de classification des conflits d'usage du sol.
//!
//! ## Features
//!
//! - Upload d'une archive ZIP contenant un shapefile d'occupation du sol
//! - Jointure spatiale avec la couche de référence des vocations
//! - Téléchargement de `conflict.zip` (shapefile enrichi du niveau de conflit)
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # Serveur HTTP
//! conflict-web serve --bind 0.0.0.0:8080 --reference static/vocation/vocation_Arauca.shp
//!
//! # Classification ponctuelle
//! conflict-web classify --input cobertura.zip --output ./out/ --report report.json
//! ```

pub mod config;
pub mod pipeline;
pub mod report;
pub mod server;

pub use config::ServerConfig;
pub use pipeline::{Pipeline, PipelineError, PipelineOutput, RequestWorkspace};
pub use report::ClassificationReport;
