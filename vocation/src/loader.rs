//! Chargement d'un shapefile (.shp + .shx + .dbf, .prj optionnel) en mémoire

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use geo::Geometry;
use shapefile::dbase::{self, FieldType, FieldValue};
use shapefile::Shape;
use tracing::debug;

use crate::types::{Crs, Dataset, Feature, Field, FieldKind, Value};
use crate::VocationError;

/// Charge un shapefile complet
///
/// # Errors
///
/// `VocationError::Load` si le .shp, le .shx ou le .dbf manque,
/// ou si l'un des flux est corrompu.
pub fn load(path: &Path) -> Result<Dataset, VocationError> {
    if !path.is_file() {
        return Err(VocationError::load(path, "file not found"));
    }
    let dbf = companion(path, "dbf")
        .ok_or_else(|| VocationError::load(path, "missing attribute table (.dbf)"))?;
    let shx = companion(path, "shx")
        .ok_or_else(|| VocationError::load(path, "missing shape index (.shx)"))?;

    let crs = read_crs(path)?;
    let (mut reader, fields) = open_reader(path, &shx, &dbf)?;

    let mut features = Vec::new();
    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item.map_err(|e| VocationError::load(path, e.to_string()))?;

        let geometry = match shape {
            Shape::NullShape => None,
            other => Some(
                Geometry::<f64>::try_from(other)
                    .map_err(|e| VocationError::load(path, e.to_string()))?,
            ),
        };

        let values = fields
            .iter()
            .map(|f| record.get(&f.name).map(convert_value).unwrap_or(Value::Null))
            .collect();

        features.push(Feature { geometry, values });
    }

    debug!(
        path = %path.display(),
        features = features.len(),
        fields = fields.len(),
        crs = ?crs.as_ref().map(|c| c.to_string()),
        "Shapefile loaded"
    );

    Ok(Dataset {
        fields,
        features,
        crs,
    })
}

/// Cherche un fichier compagnon (extension minuscule puis majuscule)
pub fn companion(shp: &Path, ext: &str) -> Option<PathBuf> {
    [ext.to_ascii_lowercase(), ext.to_ascii_uppercase()]
        .into_iter()
        .map(|e| shp.with_extension(e))
        .find(|p| p.is_file())
}

type ShapefileReader = shapefile::Reader<BufReader<File>, BufReader<File>>;

/// Ouvre le .shp avec les compagnons déjà résolus (casse quelconque)
/// et lit le schéma attributaire
fn open_reader(
    shp: &Path,
    shx: &Path,
    dbf: &Path,
) -> Result<(ShapefileReader, Vec<Field>), VocationError> {
    let open = |p: &Path| {
        File::open(p)
            .map(BufReader::new)
            .map_err(|e| VocationError::load(p, e.to_string()))
    };

    let shapes = shapefile::ShapeReader::with_shx(open(shp)?, open(shx)?)
        .map_err(|e| VocationError::load(shp, e.to_string()))?;
    let table = dbase::Reader::from_path(dbf).map_err(|e| VocationError::load(dbf, e.to_string()))?;

    let fields = read_schema(table.fields());

    Ok((shapefile::Reader::new(shapes, table), fields))
}

/// Schéma attributaire tiré de l'en-tête du .dbf
fn read_schema(infos: &[dbase::FieldInfo]) -> Vec<Field> {
    infos
        .iter()
        // Champ système "DeletionFlag" exposé par certains lecteurs dbase
        .filter(|info| info.name() != "DeletionFlag")
        .map(|info| Field::new(info.name(), kind_of(info.field_type())))
        .collect()
}

fn kind_of(field_type: FieldType) -> FieldKind {
    match field_type {
        FieldType::Numeric
        | FieldType::Float
        | FieldType::Integer
        | FieldType::Double
        | FieldType::Currency => FieldKind::Number,
        FieldType::Logical => FieldKind::Logical,
        FieldType::Date => FieldKind::Date,
        _ => FieldKind::Text,
    }
}

fn convert_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(s)) => Value::Text(s.trim_end().to_string()),
        FieldValue::Numeric(Some(n)) => Value::Number(*n),
        FieldValue::Float(Some(n)) => Value::Number(f64::from(*n)),
        FieldValue::Integer(n) => Value::Number(f64::from(*n)),
        FieldValue::Double(n) | FieldValue::Currency(n) => Value::Number(*n),
        FieldValue::Logical(Some(b)) => Value::Logical(*b),
        FieldValue::Date(Some(d)) => Value::Date(*d),
        FieldValue::Memo(s) => Value::Text(s.clone()),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => Value::Null,
        other => Value::Text(format!("{:?}", other)),
    }
}

/// Lit le .prj s'il existe
fn read_crs(shp: &Path) -> Result<Option<Crs>, VocationError> {
    let Some(prj) = companion(shp, "prj") else {
        return Ok(None);
    };
    let wkt = std::fs::read_to_string(&prj)
        .map_err(|e| VocationError::load(&prj, e.to_string()))?;
    if wkt.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(Crs::from_wkt(&wkt)))
}
