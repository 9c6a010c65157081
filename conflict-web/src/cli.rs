//! Définition et implémentation des commandes CLI
//!
//! - `serve` : serveur HTTP d'upload/téléchargement
//! - `classify` : une classification depuis la ligne de commande

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use conflict_web::config::{self, ServerConfig};
use conflict_web::pipeline::{Pipeline, RequestWorkspace};
use conflict_web::server;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the upload/download web server
    Serve {
        /// Listen address (défaut : env CONFLICT_BIND / 127.0.0.1:8080)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Vocation reference shapefile (défaut : env VOCATION_REFERENCE)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Root of the per-request working directories (défaut : env CONFLICT_WORK_DIR)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Maximum upload size in MB (défaut : env CONFLICT_MAX_UPLOAD_MB / 64)
        #[arg(long)]
        max_upload_mb: Option<usize>,

        /// Seconds before an undownloaded result is purged (défaut : env CONFLICT_RESULT_TTL_SECS / 3600)
        #[arg(long)]
        result_ttl_secs: Option<u64>,
    },

    /// Classify a land cover archive once and write conflict.zip
    Classify {
        /// ZIP archive containing the land cover shapefile
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for conflict.zip
        #[arg(short, long)]
        output: PathBuf,

        /// Vocation reference shapefile (défaut : env VOCATION_REFERENCE)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Save the classification report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// Lance le serveur HTTP
pub async fn cmd_serve(
    bind: Option<SocketAddr>,
    reference: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    max_upload_mb: Option<usize>,
    result_ttl_secs: Option<u64>,
) -> Result<()> {
    let mut config = ServerConfig::from_env()?;
    config.apply_overrides(bind, reference, work_dir, max_upload_mb, result_ttl_secs);
    config.validate()?;

    server::serve(config).await
}

/// Classifie une archive et copie `conflict.zip` dans `output`
pub async fn cmd_classify(
    input: &Path,
    output: &Path,
    reference: Option<PathBuf>,
    report_path: Option<&Path>,
) -> Result<()> {
    let mut config = ServerConfig::from_env()?;
    config.apply_overrides(None, reference, None, None, None);
    config::check_reference(&config.reference)?;

    if !input.is_file() {
        anyhow::bail!("Input archive not found: {}", input.display());
    }
    std::fs::create_dir_all(output)
        .with_context(|| format!("Cannot create output directory: {}", output.display()))?;

    let input = input.to_path_buf();
    let output = output.to_path_buf();
    let work_root = config.work_dir.clone();
    let pipeline = Pipeline::new(config.reference.clone());

    let (target, report) = tokio::task::spawn_blocking(move || -> Result<_> {
        let workspace = RequestWorkspace::create(&work_root)
            .with_context(|| format!("Cannot create workspace in {}", work_root.display()))?;
        let result = pipeline.run(&input, &workspace);
        let out = result.context("Classification failed")?;

        let file_name = out
            .archive
            .file_name()
            .context("Archive has no file name")?;
        let target = output.join(file_name);
        std::fs::copy(&out.archive, &target)
            .with_context(|| format!("Cannot copy archive to {}", target.display()))?;
        workspace.discard_result();

        Ok((target, out.report))
    })
    .await??;

    report.display();
    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .with_context(|| format!("Cannot save report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    println!("Archive: {}", target.display());
    Ok(())
}
