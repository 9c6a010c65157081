//! Serveur HTTP (axum)
//!
//! | Route                            | Rôle                                   |
//! |----------------------------------|----------------------------------------|
//! | `GET /`                          | Formulaire d'upload (champ `file1`)    |
//! | `POST /`                         | Classification, redirection 303        |
//! | `GET /download/:id/:filename`    | Archive `conflict.zip` (usage unique)  |
//! | `GET /health`                    | Sonde de vie                           |

pub mod error;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::pipeline::{Pipeline, PipelineError, RequestWorkspace};
pub use error::AppError;

/// Nom du champ multipart attendu
pub const UPLOAD_FIELD: &str = "file1";

const UPLOAD_FILE_NAME: &str = "upload.zip";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Land use conflict</title>
</head>
<body>
  <h1>Land use conflict</h1>
  <p>Upload a ZIP archive containing a land cover shapefile (.shp, .shx, .dbf, .prj).</p>
  <form method="post" enctype="multipart/form-data">
    <input type="file" name="file1" accept=".zip" required>
    <button type="submit">Classify</button>
  </form>
</body>
</html>
"#;

/// État partagé entre les handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let pipeline = Pipeline::new(config.reference.clone());
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Assemble le routeur complet
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.body_limit();

    Router::new()
        .route("/", get(index).post(upload))
        .route("/download/:request_id/:filename", get(download))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Démarre le serveur et bloque jusqu'à son arrêt
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        bind = %config.bind,
        reference = %config.reference.display(),
        work_dir = %config.work_dir.display(),
        reprojection = vocation::reproject::is_available(),
        result_ttl_secs = config.result_ttl_secs,
        "Listening"
    );
    RequestWorkspace::sweep_stale(&config.work_dir, config.result_ttl());
    axum::serve(listener, app(AppState::new(config))).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "ok"
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, AppError> {
    let bytes = read_upload_field(&mut multipart)
        .await?
        .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    let work_root = state.config.work_dir.clone();
    let ttl = state.config.result_ttl();
    let pipeline = Arc::clone(&state.pipeline);

    // Le pipeline est synchrone : il tourne sur un worker bloquant
    let outcome = tokio::task::spawn_blocking(move || -> Result<_, PipelineError> {
        RequestWorkspace::sweep_stale(&work_root, ttl);
        let workspace = RequestWorkspace::create(&work_root)?;
        let archive = workspace.upload_dir().join(UPLOAD_FILE_NAME);
        if let Err(e) = std::fs::write(&archive, &bytes) {
            workspace.discard_result();
            return Err(e.into());
        }
        let output = pipeline.run(&archive, &workspace)?;
        Ok((workspace.id(), output))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Pipeline task failed: {}", e)))?;

    let (request_id, output) = outcome?;
    let filename = output
        .archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Internal("Archive has no file name".to_string()))?;

    let location = format!("/download/{}/{}", request_id, filename);
    info!(request_id = %request_id, location = %location, "Classification done");
    Ok(Redirect::to(&location).into_response())
}

/// Lit le champ `file1` ; `None` si absent ou vide
async fn read_upload_field(multipart: &mut Multipart) -> Result<Option<Vec<u8>>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Cannot read upload: {}", e)))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(bytes.to_vec()));
    }
    Ok(None)
}

async fn download(
    State(state): State<AppState>,
    Path((request_id, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound("File not found".to_string());

    let id = Uuid::parse_str(&request_id).map_err(|_| not_found())?;
    if !is_plain_file_name(&filename) {
        return Err(not_found());
    }

    let result_dir = RequestWorkspace::result_dir_for(&state.config.work_dir, &id);
    let path: PathBuf = result_dir.join(&filename);
    if !path.is_file() {
        return Err(not_found());
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Internal(format!("Cannot read {}: {}", path.display(), e)))?;

    // Téléchargement unique
    if let Err(e) = tokio::fs::remove_dir_all(&result_dir).await {
        warn!(request_id = %id, error = %e, "Cannot remove result directory");
    }
    info!(request_id = %id, filename = %filename, size = bytes.len(), "Archive served");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Nom de fichier simple, sans séparateur ni composant relatif
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
}
