//! Rapport de classification
//!
//! Résume une exécution du pipeline : volumes, lignes par niveau de conflit,
//! reprojection et durée. Affiché par la CLI, journalisé par le serveur et
//! sérialisable en JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use vocation::{ClassifyStats, ConflictLevel};

/// Rapport complet d'une classification
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationReport {
    /// Identifiant de la requête (UUID)
    pub request_id: String,
    /// Durée du traitement
    pub duration_secs: f64,

    /// Nombre de features de l'upload
    pub input_features: usize,
    /// Nombre de lignes produites (une par zone intersectée)
    pub output_rows: usize,
    /// Lignes sans zone de vocation
    pub unmatched_rows: usize,
    /// Lignes dont la classe n'a pas de code de niveau 2
    pub unmapped_classes: usize,
    /// L'upload a été reprojeté dans le CRS de la référence
    pub reprojected: bool,

    /// Lignes par niveau de conflit (libellé → nombre)
    pub by_level: BTreeMap<String, usize>,
}

impl ClassificationReport {
    /// Crée un rapport vide pour une requête
    pub fn new(request_id: &str) -> Self {
        let by_level = ConflictLevel::ALL
            .iter()
            .map(|level| (level.label().to_string(), 0))
            .collect();
        Self {
            request_id: request_id.to_string(),
            by_level,
            ..Default::default()
        }
    }

    /// Reporte les statistiques de la classification
    pub fn record_stats(&mut self, stats: &ClassifyStats) {
        self.input_features = stats.input_features;
        self.output_rows = stats.output_rows;
        self.unmatched_rows = stats.unmatched_rows;
        self.unmapped_classes = stats.unmapped_classes;
        self.reprojected = stats.reprojected;
        for (level, count) in &stats.levels {
            *self.by_level.entry(level.label().to_string()).or_default() += count;
        }
    }

    /// Définit la durée du traitement
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Nombre de lignes pour un niveau donné
    pub fn count(&self, level: ConflictLevel) -> usize {
        self.by_level.get(level.label()).copied().unwrap_or(0)
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("CONFLICT REPORT - {}", self.request_id);
        println!("{}", "=".repeat(60));

        println!("\nDuration: {:.2}s", self.duration_secs);
        if self.reprojected {
            println!("Upload reprojected to the reference CRS");
        }

        println!("\n--- SUMMARY ---");
        println!(
            "Features: {} input, {} output rows, {} unmatched",
            self.input_features, self.output_rows, self.unmatched_rows
        );
        if self.unmapped_classes > 0 {
            println!("Unmapped classes: {}", self.unmapped_classes);
        }

        println!("\n--- BY CONFLICT LEVEL ---");
        for level in ConflictLevel::ALL {
            println!("  {}: {}", level.label(), self.count(level));
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} rows, {} high, {} moderate, {} no conflict, {} unknown",
            self.request_id,
            self.output_rows,
            self.count(ConflictLevel::High),
            self.count(ConflictLevel::Moderate),
            self.count(ConflictLevel::NoConflict),
            self.count(ConflictLevel::Unknown)
        )
    }
}
