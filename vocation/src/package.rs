//! Écriture du résultat en shapefile et compression en archive ZIP

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use geo::Geometry;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::PolygonRing;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::types::{Dataset, FieldKind, Value};
use crate::VocationError;

/// Fichiers compagnons embarqués dans l'archive, dans cet ordre
pub const COMPANION_EXTENSIONS: [&str; 4] = ["shp", "shx", "dbf", "prj"];

/// Longueur maximale d'un nom de champ dBase (octets)
const MAX_FIELD_NAME: usize = 10;
/// Longueur maximale d'un champ caractère dBase (octets)
const MAX_CHARACTER_LENGTH: usize = 254;

/// Écrit le jeu de données en `<base_name>.*` dans `out_dir` puis le compresse
/// dans `<base_name>.zip`. Retourne le chemin de l'archive.
///
/// # Errors
///
/// Toute erreur (géométrie non polygonale, écriture disque, compression)
/// est remontée en `VocationError::Write`. Une géométrie absente est
/// écrite en NullShape.
pub fn package(dataset: &Dataset, out_dir: &Path, base_name: &str) -> Result<PathBuf, VocationError> {
    let shp = out_dir.join(format!("{}.shp", base_name));
    write_dataset(dataset, &shp)?;

    let zip_path = out_dir.join(format!("{}.zip", base_name));
    let files: Vec<PathBuf> = COMPANION_EXTENSIONS
        .iter()
        .map(|ext| shp.with_extension(ext))
        .filter(|p| p.is_file())
        .collect();
    zip_files(&files, &zip_path).map_err(into_write_error)?;

    info!(
        archive = %zip_path.display(),
        files = files.len(),
        rows = dataset.len(),
        "Result packaged"
    );
    Ok(zip_path)
}

/// Écrit un jeu de données en shapefile (.shp/.shx/.dbf, plus .prj si le CRS est connu)
pub fn write_dataset(dataset: &Dataset, shp: &Path) -> Result<(), VocationError> {
    write_shapefile(dataset, shp).map_err(into_write_error)
}

fn write_shapefile(dataset: &Dataset, shp: &Path) -> Result<(), VocationError> {
    if let Some(parent) = shp.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let names = dbase_field_names(dataset.fields.iter().map(|f| f.name.as_str()));
    let mut builder = TableWriterBuilder::new();
    for (col, (field, name)) in dataset.fields.iter().zip(&names).enumerate() {
        let name = FieldName::try_from(name.as_str())
            .map_err(|e| VocationError::write(format!("invalid field name '{}': {:?}", name, e)))?;
        builder = match field.kind {
            FieldKind::Text => builder.add_character_field(name, character_length(dataset, col)),
            FieldKind::Number if is_integral_column(dataset, col) => {
                builder.add_numeric_field(name, 18, 0)
            }
            FieldKind::Number => builder.add_numeric_field(name, 24, 15),
            FieldKind::Logical => builder.add_logical_field(name),
            FieldKind::Date => builder.add_date_field(name),
        };
    }

    let polygons = dataset
        .features
        .iter()
        .enumerate()
        .map(|(i, f)| to_polygon(f.geometry.as_ref(), i))
        .collect::<Result<Vec<_>, _>>()?;

    // Le writer n'accepte qu'un seul type de forme : les lignes sans
    // géométrie reçoivent un polygone dégénéré, remplacé ensuite par un
    // enregistrement NullShape
    let anchor = polygons
        .iter()
        .flatten()
        .find_map(|p| p.rings().first().and_then(|r| r.points().first().copied()))
        .unwrap_or_else(|| shapefile::Point::new(0.0, 0.0));
    let placeholder = shapefile::Polygon::new(PolygonRing::Outer(vec![anchor; 4]));
    let null_rows: Vec<usize> = polygons
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_none())
        .map(|(i, _)| i)
        .collect();

    {
        let mut writer = shapefile::Writer::from_path(shp, builder)?;
        for (feature, polygon) in dataset.features.iter().zip(&polygons) {
            let mut record = Record::default();
            for ((field, name), value) in dataset.fields.iter().zip(&names).zip(&feature.values) {
                record.insert(name.clone(), to_field_value(field.kind, value));
            }
            writer.write_shape_and_record(polygon.as_ref().unwrap_or(&placeholder), &record)?;
        }
        // Les en-têtes sont finalisés à la libération du writer
    }

    if !null_rows.is_empty() {
        blank_records(shp, &null_rows)?;
    }

    let prj = shp.with_extension("prj");
    match &dataset.crs {
        Some(crs) => std::fs::write(&prj, crs.wkt())?,
        None if prj.exists() => std::fs::remove_file(&prj)?,
        None => {}
    }

    debug!(path = %shp.display(), rows = dataset.len(), "Shapefile written");
    Ok(())
}

fn to_polygon(
    geometry: Option<&Geometry>,
    row: usize,
) -> Result<Option<shapefile::Polygon>, VocationError> {
    match geometry {
        Some(Geometry::Polygon(p)) => Ok(Some(shapefile::Polygon::from(p.clone()))),
        Some(Geometry::MultiPolygon(mp)) if !mp.0.is_empty() => {
            Ok(Some(shapefile::Polygon::from(mp.clone())))
        }
        Some(Geometry::MultiPolygon(_)) | None => Ok(None),
        Some(_) => Err(VocationError::write(format!(
            "row {}: only Polygon and MultiPolygon geometries can be written",
            row
        ))),
    }
}

/// Taille de l'en-tête des fichiers .shp et .shx (octets)
const SHP_HEADER_LEN: usize = 100;
/// Contenu d'un enregistrement NullShape : le type de forme seul (mots de 16 bits)
const NULL_CONTENT_WORDS: i32 = 2;

/// Réécrit les enregistrements `rows` du .shp en NullShape et met à jour le .shx
///
/// Offsets et longueurs sont exprimés en mots de 16 bits, big-endian ;
/// le type de forme est little-endian.
fn blank_records(shp: &Path, rows: &[usize]) -> Result<(), VocationError> {
    let shx = shp.with_extension("shx");
    let shp_bytes = std::fs::read(shp)?;
    let shx_bytes = std::fs::read(&shx)?;
    if shp_bytes.len() < SHP_HEADER_LEN || shx_bytes.len() < SHP_HEADER_LEN {
        return Err(VocationError::write("truncated shapefile header"));
    }

    let read_be = |b: &[u8], at: usize| -> Result<i32, VocationError> {
        b.get(at..at + 4)
            .and_then(|s| s.try_into().ok())
            .map(i32::from_be_bytes)
            .ok_or_else(|| VocationError::write("truncated shape index"))
    };

    let count = (shx_bytes.len() - SHP_HEADER_LEN) / 8;
    let mut new_shp = shp_bytes[..SHP_HEADER_LEN].to_vec();
    let mut new_shx = shx_bytes[..SHP_HEADER_LEN].to_vec();

    for i in 0..count {
        let entry = SHP_HEADER_LEN + i * 8;
        let offset = read_be(&shx_bytes, entry)? as usize * 2;
        let content_words = read_be(&shx_bytes, entry + 4)?;

        let new_offset = (new_shp.len() / 2) as i32;
        let written_words = if rows.contains(&i) {
            new_shp.extend_from_slice(&(i as i32 + 1).to_be_bytes());
            new_shp.extend_from_slice(&NULL_CONTENT_WORDS.to_be_bytes());
            new_shp.extend_from_slice(&0i32.to_le_bytes());
            NULL_CONTENT_WORDS
        } else {
            let end = offset + 8 + content_words as usize * 2;
            let record = shp_bytes
                .get(offset..end)
                .ok_or_else(|| VocationError::write("shape record out of bounds"))?;
            new_shp.extend_from_slice(record);
            content_words
        };
        new_shx.extend_from_slice(&new_offset.to_be_bytes());
        new_shx.extend_from_slice(&written_words.to_be_bytes());
    }

    let shp_words = (new_shp.len() / 2) as i32;
    new_shp[24..28].copy_from_slice(&shp_words.to_be_bytes());

    std::fs::write(shp, new_shp)?;
    std::fs::write(&shx, new_shx)?;
    debug!(path = %shp.display(), rows = rows.len(), "Null shapes written");
    Ok(())
}

fn to_field_value(kind: FieldKind, value: &Value) -> FieldValue {
    match kind {
        FieldKind::Text => FieldValue::Character(
            value
                .to_text()
                .map(|s| truncate_bytes(&s, MAX_CHARACTER_LENGTH).to_string()),
        ),
        FieldKind::Number => FieldValue::Numeric(match value {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }),
        FieldKind::Logical => FieldValue::Logical(match value {
            Value::Logical(b) => Some(*b),
            _ => None,
        }),
        FieldKind::Date => FieldValue::Date(match value {
            Value::Date(d) => Some(*d),
            _ => None,
        }),
    }
}

/// Noms de champs dBase : 10 octets max, sans doublon
///
/// `Conflict_Level` devient `Conflict_L` ; un doublon après troncature
/// reçoit un suffixe numérique (`Conflict_1`).
pub fn dbase_field_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let mut candidate = truncate_bytes(name, MAX_FIELD_NAME).to_string();
        let mut n = 1;
        while out.contains(&candidate) {
            let suffix = format!("_{}", n);
            candidate = format!(
                "{}{}",
                truncate_bytes(name, MAX_FIELD_NAME - suffix.len()),
                suffix
            );
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// Tronque à `max` octets sans couper un caractère
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn character_length(dataset: &Dataset, col: usize) -> u8 {
    let longest = dataset
        .features
        .iter()
        .filter_map(|f| f.values.get(col).and_then(Value::to_text))
        .map(|s| s.len())
        .max()
        .unwrap_or(1);
    longest.clamp(1, MAX_CHARACTER_LENGTH) as u8
}

fn is_integral_column(dataset: &Dataset, col: usize) -> bool {
    dataset
        .features
        .iter()
        .filter_map(|f| f.values.get(col).and_then(Value::as_number))
        .all(|n| n.fract() == 0.0 && n.abs() < 1e17)
}

/// Compresse des fichiers à plat (nom de fichier seul) dans une archive ZIP
pub fn zip_files(files: &[PathBuf], zip_path: &Path) -> Result<(), VocationError> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(zip_path)?));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VocationError::write(format!("invalid file name: {}", path.display())))?;
        zip.start_file(name, options)?;
        std::io::copy(&mut File::open(path)?, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

fn into_write_error(e: VocationError) -> VocationError {
    match e {
        VocationError::Write(_) => e,
        other => VocationError::Write(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Crs, Feature, Field};
    use geo::{BoundingRect, LineString, Point, Polygon};
    use std::io::Read;

    fn square(x: f64, y: f64, size: f64) -> Geometry {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (x, y),
                (x + size, y),
                (x + size, y + size),
                (x, y + size),
                (x, y),
            ]),
            vec![],
        ))
    }

    fn sample(crs: Option<Crs>) -> Dataset {
        let mut ds = Dataset::new(
            vec![
                Field::new("class", FieldKind::Text),
                Field::new("Conflict_Level", FieldKind::Text),
            ],
            crs,
        );
        ds.features.push(Feature {
            geometry: Some(square(0.0, 0.0, 1.0)),
            values: vec![Value::Text("Forest".into()), Value::Text("High".into())],
        });
        ds
    }

    fn zip_entries(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_dbase_field_names() {
        let names = dbase_field_names(
            ["class", "Level 2", "Conflict_Level", "Conflict_Levels", "index_right"].into_iter(),
        );
        assert_eq!(
            names,
            vec!["class", "Level 2", "Conflict_L", "Conflict_1", "index_righ"]
        );
    }

    #[test]
    fn test_truncate_bytes_char_boundary() {
        assert_eq!(truncate_bytes("Agrícola", 4), "Agr");
        assert_eq!(truncate_bytes("Agrícola", 5), "Agrí");
        assert_eq!(truncate_bytes("abc", 10), "abc");
    }

    #[test]
    fn test_package_with_prj() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = package(&sample(Some(Crs::from_epsg(4326))), tmp.path(), "conflict").unwrap();

        assert_eq!(zip_path, tmp.path().join("conflict.zip"));
        assert_eq!(
            zip_entries(&zip_path),
            vec!["conflict.shp", "conflict.shx", "conflict.dbf", "conflict.prj"]
        );

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut prj = String::new();
        archive.by_name("conflict.prj").unwrap().read_to_string(&mut prj).unwrap();
        assert_eq!(prj, "EPSG:4326");
    }

    #[test]
    fn test_package_without_crs_omits_prj() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = package(&sample(None), tmp.path(), "conflict").unwrap();

        assert_eq!(
            zip_entries(&zip_path),
            vec!["conflict.shp", "conflict.shx", "conflict.dbf"]
        );
    }

    #[test]
    fn test_package_rejects_points() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ds = sample(None);
        ds.features[0].geometry = Some(Geometry::Point(Point::new(1.0, 2.0)));

        let err = package(&ds, tmp.path(), "conflict").unwrap_err();
        assert!(matches!(err, VocationError::Write(_)));
        assert!(!tmp.path().join("conflict.zip").exists());
    }

    #[test]
    fn test_null_geometry_written_as_null_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ds = sample(Some(Crs::from_epsg(4326)));
        ds.features.push(Feature {
            geometry: None,
            values: vec![Value::Text("Pastures".into()), Value::Text("Unknown".into())],
        });
        ds.features.push(Feature {
            geometry: Some(square(2.0, 2.0, 1.0)),
            values: vec![Value::Text("Forest".into()), Value::Text("High".into())],
        });

        let shp = tmp.path().join("conflict.shp");
        write_dataset(&ds, &shp).unwrap();
        let back = crate::loader::load(&shp).unwrap();

        assert_eq!(back.len(), 3);
        assert!(back.features[0].geometry.is_some());
        assert!(back.features[1].geometry.is_none());
        assert_eq!(back.value(1, "class"), Some(&Value::Text("Pastures".into())));
        // Les enregistrements suivants restent alignés sur leurs attributs
        let bbox = back.features[2].geometry.as_ref().and_then(|g| g.bounding_rect()).unwrap();
        assert_eq!(bbox.min(), geo::coord! { x: 2.0, y: 2.0 });
        assert_eq!(back.value(2, "class"), Some(&Value::Text("Forest".into())));
        assert!(package(&ds, tmp.path(), "conflict").is_ok());
    }

    #[test]
    fn test_all_rows_without_geometry() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ds = sample(None);
        ds.features[0].geometry = None;

        let shp = tmp.path().join("empty.shp");
        write_dataset(&ds, &shp).unwrap();
        let back = crate::loader::load(&shp).unwrap();
        assert_eq!(back.len(), 1);
        assert!(back.features[0].geometry.is_none());
    }

    #[test]
    fn test_package_unwritable_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = package(&sample(None), &blocker.join("sub"), "conflict").unwrap_err();
        assert!(matches!(err, VocationError::Write(_)));
    }

    #[test]
    fn test_field_value_conversion() {
        assert_eq!(
            to_field_value(FieldKind::Number, &Value::Number(3.0)),
            FieldValue::Numeric(Some(3.0))
        );
        assert_eq!(
            to_field_value(FieldKind::Number, &Value::Null),
            FieldValue::Numeric(None)
        );
        assert_eq!(
            to_field_value(FieldKind::Text, &Value::Number(31.0)),
            FieldValue::Character(Some("31".into()))
        );
        assert_eq!(
            to_field_value(FieldKind::Text, &Value::Null),
            FieldValue::Character(None)
        );
    }
}
