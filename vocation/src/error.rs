//! Types d'erreurs pour le crate vocation

use std::path::Path;

use thiserror::Error;

/// Erreurs pouvant survenir lors de l'extraction, du chargement,
/// de la classification ou de l'écriture des jeux de données
#[derive(Debug, Error)]
pub enum VocationError {
    /// Erreur d'I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shapefile absent, incomplet ou corrompu
    #[error("Cannot load {path}: {reason}")]
    Load { path: String, reason: String },

    /// Système de coordonnées absent ou transformation impossible
    #[error("CRS error: {0}")]
    Crs(String),

    /// Échec de sérialisation ou de compression du résultat
    #[error("Write failed: {0}")]
    Write(String),

    /// Erreur remontée par la lecture/écriture shapefile
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// Erreur remontée par le crate zip
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl VocationError {
    /// Crée une erreur de chargement avec contexte
    pub fn load(path: &Path, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur d'écriture
    pub fn write(reason: impl Into<String>) -> Self {
        Self::Write(reason.into())
    }

    /// Crée une erreur de CRS
    pub fn crs(reason: impl Into<String>) -> Self {
        Self::Crs(reason.into())
    }
}
