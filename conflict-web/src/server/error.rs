//! Erreurs HTTP
//!
//! Chaque erreur devient une réponse JSON `{"error":{"code","message"}}`.
//! Le détail des erreurs internes est journalisé, jamais renvoyé au client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::PipelineError;

/// Message renvoyé pour toute erreur de traitement
pub const PROCESSING_MESSAGE: &str = "Error processing the shapefiles";

/// Corps JSON des réponses d'erreur
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Code machine (`BAD_REQUEST`, `NOT_FOUND`, ...)
    pub code: String,
    pub message: String,
}

/// Erreur applicative convertie en réponse HTTP
#[derive(Debug, Error)]
pub enum AppError {
    /// Requête invalide (400)
    #[error("{0}")]
    BadRequest(String),

    /// Ressource inconnue (404)
    #[error("{0}")]
    NotFound(String),

    /// Erreur serveur (500), le message n'est pas exposé
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Request processing failed");
                PROCESSING_MESSAGE.to_string()
            }
            other => {
                tracing::info!(status = %status, error = %other, "Request rejected");
                other.to_string()
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Extraction => Self::BadRequest(err.to_string()),
            PipelineError::Processing(e) => Self::Internal(e.to_string()),
        }
    }
}
