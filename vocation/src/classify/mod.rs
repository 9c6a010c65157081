//! Classification des conflits d'usage
//!
//! 1. Alignement du CRS de l'upload sur celui de la référence
//! 2. Jointure spatiale gauche (`intersects`), une ligne par zone touchée
//! 3. Normalisation de la classe d'occupation en code de niveau 2
//! 4. Niveau de conflit via la table de règles

pub mod join;

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::reproject;
use crate::rules::{self, ConflictLevel, Vocation};
use crate::types::{Dataset, Feature, Field, FieldKind, Value};
use crate::VocationError;

pub use join::SpatialIndex;

/// Attribut de classe d'occupation du sol dans l'upload
pub const CLASS_FIELD: &str = "class";
/// Attribut de vocation dans la référence
pub const VOCATION_FIELD: &str = "Vocacion";
/// Index de la feature de référence jointe
pub const INDEX_RIGHT_FIELD: &str = "index_right";
pub const LEVEL2_FIELD: &str = "Level 2";
pub const CONFLICT_FIELD: &str = "Conflict_Level";

const ADDED_FIELDS: [&str; 4] = [INDEX_RIGHT_FIELD, VOCATION_FIELD, LEVEL2_FIELD, CONFLICT_FIELD];

/// Statistiques d'une classification
#[derive(Debug, Clone, Default)]
pub struct ClassifyStats {
    /// Features de l'upload
    pub input_features: usize,
    /// Lignes produites par la jointure
    pub output_rows: usize,
    /// Lignes sans zone de vocation
    pub unmatched_rows: usize,
    /// Lignes dont la classe n'a pas de code de niveau 2
    pub unmapped_classes: usize,
    /// L'upload a été reprojeté dans le CRS de la référence
    pub reprojected: bool,
    /// Nombre de lignes par niveau de conflit
    pub levels: HashMap<ConflictLevel, usize>,
}

/// Classifie l'upload contre la référence de vocation
pub fn classify(upload: &Dataset, reference: &Dataset) -> Result<Dataset, VocationError> {
    classify_with_stats(upload, reference).map(|(dataset, _)| dataset)
}

/// Comme [`classify`], avec les statistiques de la classification
pub fn classify_with_stats(
    upload: &Dataset,
    reference: &Dataset,
) -> Result<(Dataset, ClassifyStats), VocationError> {
    let reference_crs = reference
        .crs
        .as_ref()
        .ok_or_else(|| VocationError::crs("reference dataset has no CRS (.prj)"))?;
    let upload_crs = upload
        .crs
        .as_ref()
        .ok_or_else(|| VocationError::crs("uploaded dataset has no CRS (.prj)"))?;

    let vocation_idx = reference.field_index(VOCATION_FIELD).ok_or_else(|| VocationError::Load {
        path: "reference".into(),
        reason: format!("missing '{}' attribute", VOCATION_FIELD),
    })?;
    let class_idx = upload.field_index(CLASS_FIELD).ok_or_else(|| VocationError::Load {
        path: "upload".into(),
        reason: format!("missing '{}' attribute", CLASS_FIELD),
    })?;

    let mut stats = ClassifyStats {
        input_features: upload.len(),
        ..Default::default()
    };

    // La référence n'est jamais reprojetée
    let reprojected;
    let upload = if upload_crs != reference_crs {
        info!(from = %upload_crs, to = %reference_crs, "Reprojecting upload");
        stats.reprojected = true;
        reprojected = reproject::reproject_dataset(upload, reference_crs)?;
        &reprojected
    } else {
        upload
    };

    // Colonnes de l'upload conservées (celles qui portent un nom ajouté sont remplacées)
    let kept: Vec<usize> = (0..upload.fields.len())
        .filter(|&i| !ADDED_FIELDS.contains(&upload.fields[i].name.as_str()))
        .collect();
    if kept.len() != upload.fields.len() {
        warn!("Upload attributes overwritten by the classification columns");
    }

    let mut fields: Vec<Field> = kept.iter().map(|&i| upload.fields[i].clone()).collect();
    fields.push(Field::new(INDEX_RIGHT_FIELD, FieldKind::Number));
    fields.push(Field::new(VOCATION_FIELD, FieldKind::Text));
    fields.push(Field::new(LEVEL2_FIELD, FieldKind::Text));
    fields.push(Field::new(CONFLICT_FIELD, FieldKind::Text));

    let mut out = Dataset::new(fields, Some(reference_crs.clone()));
    let index = SpatialIndex::build(reference);
    if index.is_empty() {
        warn!("Reference has no geometry, every row will be unmatched");
    } else {
        debug!(indexed = index.len(), "Reference index built");
    }

    for feature in &upload.features {
        let class = feature
            .values
            .get(class_idx)
            .and_then(Value::to_text)
            .unwrap_or_default();
        let level2 = rules::level2_code(&class).to_string();
        let mapped = level2 != class;

        let matches = feature
            .geometry
            .as_ref()
            .map(|g| index.intersecting(g))
            .unwrap_or_default();

        let base: Vec<Value> = kept.iter().map(|&i| feature.values[i].clone()).collect();

        // Jointure gauche : au moins une ligne par feature
        let rows: Vec<Option<usize>> = if matches.is_empty() {
            vec![None]
        } else {
            matches.into_iter().map(Some).collect()
        };

        for matched in rows {
            let vocation_label = matched
                .and_then(|r| reference.features[r].values.get(vocation_idx))
                .and_then(Value::to_text);
            let level = rules::conflict_level(
                vocation_label.as_deref().and_then(Vocation::from_label),
                &level2,
            );

            if matched.is_none() {
                stats.unmatched_rows += 1;
            }
            if !mapped {
                stats.unmapped_classes += 1;
            }
            *stats.levels.entry(level).or_default() += 1;

            let mut values = base.clone();
            values.push(matched.map_or(Value::Null, |r| Value::Number(r as f64)));
            values.push(vocation_label.map_or(Value::Null, Value::Text));
            values.push(Value::Text(level2.clone()));
            values.push(Value::Text(level.label().to_string()));

            out.features.push(Feature {
                geometry: feature.geometry.clone(),
                values,
            });
        }
    }

    stats.output_rows = out.len();
    info!(
        input = stats.input_features,
        rows = stats.output_rows,
        unmatched = stats.unmatched_rows,
        unmapped = stats.unmapped_classes,
        "Classification done"
    );

    Ok((out, stats))
}
