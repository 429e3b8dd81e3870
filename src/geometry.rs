use geo::{BooleanOps, BoundingRect, Centroid, Contains, InteriorPoint, MultiPolygon, Rect, Relate};
use rstar::{RTree, RTreeObject, AABB};

use crate::error::{Result, RsmError};

#[derive(Debug, Clone)]
pub struct BoundingBox {
    idx: usize, // zone row
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Zone polygons with an R-tree over their bounding boxes.
#[derive(Debug, Clone)]
pub struct ZoneGeometry {
    geoms: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
}

impl ZoneGeometry {
    /// Construct from one MultiPolygon per zone. Empty geometries are kept
    /// but never indexed.
    pub fn new(polygons: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(polygons.iter().enumerate()
                .filter_map(|(i, poly)| poly.bounding_rect().map(|bbox| BoundingBox { idx: i, bbox }))
                .collect()),
            geoms: polygons,
        }
    }

    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    #[inline] pub fn geoms(&self) -> &[MultiPolygon<f64>] { &self.geoms }

    /// Rook neighbours of every zone: zones whose boundaries share a segment
    /// of positive length. Zones meeting only at a corner are not neighbours.
    pub fn rook_adjacency(&self) -> Result<Vec<Vec<u32>>> {
        let mut neighbors = vec![Vec::new(); self.geoms.len()];

        for (zone, geom) in self.geoms.iter().enumerate() {
            let Some(rect) = geom.bounding_rect() else { continue };
            let search = AABB::from_corners(rect.min().into(), rect.max().into());

            for other in self.rtree.locate_in_envelope_intersecting(&search).map(|b| b.idx) {
                if other <= zone { continue }

                // touching, with a one-dimensional boundary intersection
                let relation = geom.relate(&self.geoms[other]);
                let shared_edge = relation.matches("****1****")
                    .map_err(|e| RsmError::Geometry(format!("invalid DE-9IM pattern: {e}")))?;
                if relation.is_touches() && shared_edge {
                    neighbors[zone].push(other as u32);
                    neighbors[other].push(zone as u32);
                }
            }
        }

        neighbors.iter_mut().for_each(|list| list.sort_unstable());
        Ok(neighbors)
    }

    /// Row of the cluster polygon holding each fine zone, found through the
    /// fine zone's interior point. A fine zone outside every cluster is an error.
    pub fn locate(&self, fine: &[MultiPolygon<f64>]) -> Result<Vec<usize>> {
        fine.iter().enumerate().map(|(zone, geom)| {
            let point = geom.interior_point()
                .ok_or_else(|| RsmError::Geometry(format!("fine zone {zone} has an empty polygon")))?;
            let envelope = AABB::from_point([point.x(), point.y()]);

            self.rtree.locate_in_envelope_intersecting(&envelope)
                .map(|b| b.idx)
                .find(|&cluster| self.geoms[cluster].contains(&point))
                .ok_or_else(|| RsmError::Geometry(format!("fine zone {zone} lies outside every cluster")))
        }).collect()
    }

    /// Dissolve each group of member zones into one cluster polygon.
    pub fn dissolve(&self, groups: &[Vec<usize>]) -> Vec<MultiPolygon<f64>> {
        groups.iter()
            .map(|rows| rows.iter()
                .map(|&r| &self.geoms[r])
                .fold(MultiPolygon::new(vec![]), |acc, geom| acc.union(geom)))
            .collect()
    }

    /// Centroid of each geometry, or None for empty ones.
    pub fn centroids(&self) -> Vec<Option<(f64, f64)>> {
        self.geoms.iter()
            .map(|geom| geom.centroid().map(|p| (p.x(), p.y())))
            .collect()
    }
}
