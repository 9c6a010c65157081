//! Jointure spatiale gauche sur le prédicat `intersects`

use geo::{BoundingRect, Geometry, Intersects};
use rstar::{RTree, RTreeObject, AABB};

use crate::types::Dataset;

/// Emprise d'une feature de référence, indexée dans le R-tree
#[derive(Debug, Clone)]
struct IndexedEnvelope {
    index: usize,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

fn envelope_of(geom: &Geometry) -> Option<AABB<[f64; 2]>> {
    let rect = geom.bounding_rect()?;
    Some(AABB::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

/// Index spatial d'un jeu de référence
///
/// Le R-tree filtre sur les emprises, `Intersects` confirme.
pub struct SpatialIndex<'a> {
    tree: RTree<IndexedEnvelope>,
    reference: &'a Dataset,
}

impl<'a> SpatialIndex<'a> {
    pub fn build(reference: &'a Dataset) -> Self {
        let envelopes: Vec<IndexedEnvelope> = reference
            .features
            .iter()
            .enumerate()
            .filter_map(|(index, f)| {
                let env = envelope_of(f.geometry.as_ref()?)?;
                Some(IndexedEnvelope { index, env })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(envelopes),
            reference,
        }
    }

    /// Indices (croissants) des features de référence qui intersectent `geom`
    pub fn intersecting(&self, geom: &Geometry) -> Vec<usize> {
        let Some(env) = envelope_of(geom) else {
            return Vec::new();
        };

        let mut matches: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&env)
            .filter(|candidate| {
                self.reference.features[candidate.index]
                    .geometry
                    .as_ref()
                    .map_or(false, |other| geom.intersects(other))
            })
            .map(|candidate| candidate.index)
            .collect();
        matches.sort_unstable();
        matches
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feature;
    use geo::{LineString, Polygon};

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

    fn reference(geoms: Vec<Option<Geometry>>) -> Dataset {
        let mut ds = Dataset::new(vec![], None);
        ds.features = geoms
            .into_iter()
            .map(|geometry| Feature {
                geometry,
                values: vec![],
            })
            .collect();
        ds
    }

    #[test]
    fn test_intersecting_fan_out_sorted() {
        let reference = reference(vec![
            Some(square(10.0, 0.0, 10.0)),
            Some(square(0.0, 0.0, 10.0)),
            Some(square(100.0, 100.0, 10.0)),
        ]);
        let index = SpatialIndex::build(&reference);
        assert_eq!(index.len(), 3);

        // À cheval sur les deux premières zones
        assert_eq!(index.intersecting(&square(8.0, 2.0, 4.0)), vec![0, 1]);
        assert_eq!(index.intersecting(&square(1.0, 1.0, 2.0)), vec![1]);
        assert!(index.intersecting(&square(50.0, 50.0, 1.0)).is_empty());
    }

    #[test]
    fn test_envelope_overlap_without_intersection() {
        // Triangle dont l'emprise recouvre le carré sans le toucher
        let triangle = Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (0.0, 0.0)]),
            vec![],
        ));
        let reference = reference(vec![Some(triangle)]);
        let index = SpatialIndex::build(&reference);

        assert!(index.intersecting(&square(8.0, 8.0, 1.0)).is_empty());
        assert_eq!(index.intersecting(&square(1.0, 1.0, 1.0)), vec![0]);
    }

    #[test]
    fn test_touching_boundary_intersects() {
        let reference = reference(vec![Some(square(0.0, 0.0, 10.0))]);
        let index = SpatialIndex::build(&reference);
        assert_eq!(index.intersecting(&square(10.0, 0.0, 5.0)), vec![0]);
    }

    #[test]
    fn test_null_reference_geometry_skipped() {
        let reference = reference(vec![None, Some(square(0.0, 0.0, 10.0))]);
        let index = SpatialIndex::build(&reference);
        assert_eq!(index.len(), 1);
        assert_eq!(index.intersecting(&square(1.0, 1.0, 1.0)), vec![1]);
    }
}
