//! Configuration du serveur
//!
//! Lue depuis l'environnement (`.env` chargé au démarrage), puis surchargée
//! par les options de la ligne de commande.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// Adresse d'écoute par défaut
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Couche de référence des vocations par défaut
pub const DEFAULT_REFERENCE: &str = "static/vocation/vocation_Arauca.shp";

/// Taille maximale d'un upload par défaut (Mo)
pub const DEFAULT_MAX_UPLOAD_MB: usize = 64;

/// Durée de conservation par défaut d'un résultat jamais téléchargé (s)
pub const DEFAULT_RESULT_TTL_SECS: u64 = 3600;

/// Configuration du serveur
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Adresse d'écoute
    pub bind: SocketAddr,
    /// Shapefile de référence (doit porter l'attribut `Vocacion`)
    pub reference: PathBuf,
    /// Racine des répertoires de travail par requête
    pub work_dir: PathBuf,
    /// Taille maximale d'un upload (Mo)
    pub max_upload_mb: usize,
    /// Âge au-delà duquel un répertoire de résultat est purgé (s)
    pub result_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            reference: PathBuf::from(DEFAULT_REFERENCE),
            work_dir: default_work_dir(),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            result_ttl_secs: DEFAULT_RESULT_TTL_SECS,
        }
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("conflict-web")
}

impl ServerConfig {
    /// Construit la configuration depuis les variables d'environnement
    ///
    /// - `CONFLICT_BIND` (défaut : `127.0.0.1:8080`)
    /// - `VOCATION_REFERENCE` (défaut : `static/vocation/vocation_Arauca.shp`)
    /// - `CONFLICT_WORK_DIR` (défaut : `<tmp>/conflict-web`)
    /// - `CONFLICT_MAX_UPLOAD_MB` (défaut : 64)
    /// - `CONFLICT_RESULT_TTL_SECS` (défaut : 3600)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(bind) = lookup("CONFLICT_BIND") {
            config.bind = bind
                .parse()
                .with_context(|| format!("Invalid CONFLICT_BIND: {}", bind))?;
        }
        if let Some(reference) = lookup("VOCATION_REFERENCE") {
            config.reference = PathBuf::from(reference);
        }
        if let Some(work_dir) = lookup("CONFLICT_WORK_DIR") {
            config.work_dir = PathBuf::from(work_dir);
        }
        if let Some(max) = lookup("CONFLICT_MAX_UPLOAD_MB") {
            config.max_upload_mb = max
                .parse()
                .with_context(|| format!("Invalid CONFLICT_MAX_UPLOAD_MB: {}", max))?;
        }
        if let Some(ttl) = lookup("CONFLICT_RESULT_TTL_SECS") {
            config.result_ttl_secs = ttl
                .parse()
                .with_context(|| format!("Invalid CONFLICT_RESULT_TTL_SECS: {}", ttl))?;
        }

        Ok(config)
    }

    /// Applique les options de la CLI (prioritaires sur l'environnement)
    pub fn apply_overrides(
        &mut self,
        bind: Option<SocketAddr>,
        reference: Option<PathBuf>,
        work_dir: Option<PathBuf>,
        max_upload_mb: Option<usize>,
        result_ttl_secs: Option<u64>,
    ) {
        if let Some(bind) = bind {
            self.bind = bind;
        }
        if let Some(reference) = reference {
            self.reference = reference;
        }
        if let Some(work_dir) = work_dir {
            self.work_dir = work_dir;
        }
        if let Some(max) = max_upload_mb {
            self.max_upload_mb = max;
        }
        if let Some(ttl) = result_ttl_secs {
            self.result_ttl_secs = ttl;
        }
    }

    /// Vérifie que la configuration est utilisable
    pub fn validate(&self) -> Result<()> {
        check_reference(&self.reference)?;
        if self.max_upload_mb == 0 {
            anyhow::bail!("CONFLICT_MAX_UPLOAD_MB must be greater than 0");
        }
        std::fs::create_dir_all(&self.work_dir).with_context(|| {
            format!("Cannot create work directory: {}", self.work_dir.display())
        })?;
        Ok(())
    }

    /// Limite de taille du corps de requête en octets
    pub fn body_limit(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

/// Vérifie la présence du shapefile de référence
pub fn check_reference(path: &Path) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("Vocation reference not found: {}", path.display());
    }
    Ok(())
}
