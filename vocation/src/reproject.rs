//! Reprojection de géométries avec PROJ
//!
//! Disponible uniquement avec le feature `reproject`.

use crate::types::{Crs, Dataset};
use crate::VocationError;

#[cfg(feature = "reproject")]
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
#[cfg(feature = "reproject")]
use proj::Proj;

/// Vérifie si la reprojection est disponible
pub fn is_available() -> bool {
    cfg!(feature = "reproject")
}

/// Reprojette toutes les géométries d'un jeu de données vers `target`
pub fn reproject_dataset(dataset: &Dataset, target: &Crs) -> Result<Dataset, VocationError> {
    let source = dataset
        .crs
        .as_ref()
        .ok_or_else(|| VocationError::crs("source dataset has no CRS"))?;
    let reprojector = Reprojector::new(source, target)?;

    let mut out = Dataset::new(dataset.fields.clone(), Some(target.clone()));
    out.features = dataset
        .features
        .iter()
        .map(|f| {
            let mut f = f.clone();
            if let Some(geom) = &f.geometry {
                f.geometry = Some(reprojector.transform_geometry(geom)?);
            }
            Ok(f)
        })
        .collect::<Result<_, VocationError>>()?;
    Ok(out)
}

/// Reprojection entre deux systèmes de coordonnées
#[cfg(feature = "reproject")]
pub struct Reprojector {
    proj: Option<Proj>,
}

#[cfg(feature = "reproject")]
impl Reprojector {
    /// Crée un reprojector (identité si les deux CRS sont égaux)
    pub fn new(source: &Crs, target: &Crs) -> Result<Self, VocationError> {
        if source == target {
            return Ok(Self { proj: None });
        }

        let proj = Proj::new_known_crs(&source.definition(), &target.definition(), None)
            .map_err(|e| {
                VocationError::crs(format!(
                    "cannot create transformation from {} to {}: {}",
                    source, target, e
                ))
            })?;

        Ok(Self { proj: Some(proj) })
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, VocationError> {
        let Some(proj) = &self.proj else {
            return Ok(geom.clone());
        };

        match geom {
            Geometry::Point(p) => {
                let (x, y) = transform_coord(proj, p.0)?;
                Ok(Geometry::Point(Point::new(x, y)))
            }
            Geometry::LineString(ls) => Ok(Geometry::LineString(transform_linestring(proj, ls)?)),
            Geometry::Polygon(p) => Ok(Geometry::Polygon(transform_polygon(proj, p)?)),
            Geometry::MultiPoint(mp) => {
                let points = mp
                    .0
                    .iter()
                    .map(|p| transform_coord(proj, p.0).map(|(x, y)| Point::new(x, y)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Geometry::MultiPoint(MultiPoint::new(points)))
            }
            Geometry::MultiLineString(mls) => {
                let lines = mls
                    .0
                    .iter()
                    .map(|ls| transform_linestring(proj, ls))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Geometry::MultiLineString(MultiLineString::new(lines)))
            }
            Geometry::MultiPolygon(mp) => {
                let polys = mp
                    .0
                    .iter()
                    .map(|p| transform_polygon(proj, p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys)))
            }
            other => Err(VocationError::crs(format!(
                "unsupported geometry for reprojection: {:?}",
                other
            ))),
        }
    }
}

#[cfg(feature = "reproject")]
fn transform_coord(proj: &Proj, coord: Coord) -> Result<(f64, f64), VocationError> {
    proj.convert((coord.x, coord.y))
        .map_err(|e| VocationError::crs(format!("coordinate transformation failed: {}", e)))
}

/// Transformation par lot d'une LineString
#[cfg(feature = "reproject")]
fn transform_linestring(proj: &Proj, ls: &LineString) -> Result<LineString, VocationError> {
    let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

    proj.convert_array(&mut coords)
        .map_err(|e| VocationError::crs(format!("batch transformation failed: {}", e)))?;

    Ok(LineString::new(
        coords.into_iter().map(|(x, y)| Coord { x, y }).collect(),
    ))
}

#[cfg(feature = "reproject")]
fn transform_polygon(proj: &Proj, p: &Polygon) -> Result<Polygon, VocationError> {
    let exterior = transform_linestring(proj, p.exterior())?;
    let interiors = p
        .interiors()
        .iter()
        .map(|ls| transform_linestring(proj, ls))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// Reprojector sans PROJ : seule l'identité est possible
#[cfg(not(feature = "reproject"))]
pub struct Reprojector;

#[cfg(not(feature = "reproject"))]
impl Reprojector {
    pub fn new(source: &Crs, target: &Crs) -> Result<Self, VocationError> {
        if source == target {
            Ok(Self)
        } else {
            Err(VocationError::crs(format!(
                "reprojection from {} to {} requires the 'reproject' feature",
                source, target
            )))
        }
    }

    pub fn transform_geometry(
        &self,
        geom: &geo::Geometry,
    ) -> Result<geo::Geometry, VocationError> {
        Ok(geom.clone())
    }
}
