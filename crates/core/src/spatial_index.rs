//! R-tree over polygon bounding boxes
//!
//! Narrows containment and buffer checks to the polygons whose envelope can
//! possibly match; exact geometry tests run on the survivors only.

use crate::geometry::{BoundingBox, Coord};
use rstar::{RTree, RTreeObject, AABB};

/// Index entry: a polygon slot and its envelope
#[derive(Debug, Clone)]
struct IndexedEnvelope {
    slot: usize,
    bounds: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

/// Envelope index keyed by polygon slot
#[derive(Clone)]
pub struct PolygonIndex {
    tree: RTree<IndexedEnvelope>,
    count: usize,
}

impl std::fmt::Debug for PolygonIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolygonIndex")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl PolygonIndex {
    /// Bulk-load from `(slot, bounding box)` pairs
    pub fn build(boxes: impl Iterator<Item = (usize, BoundingBox)>) -> Self {
        let entries: Vec<IndexedEnvelope> = boxes
            .map(|(slot, bbox)| IndexedEnvelope {
                slot,
                bounds: AABB::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y]),
            })
            .collect();
        let count = entries.len();
        Self {
            tree: RTree::bulk_load(entries),
            count,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Slots whose envelope contains the point, ascending
    pub fn candidates_at(&self, point: &Coord) -> Vec<usize> {
        self.candidates_within(point, 0.0, 0.0)
    }

    /// Slots whose envelope intersects the box `point ± (dx, dy)`, ascending
    pub fn candidates_within(&self, point: &Coord, dx: f64, dy: f64) -> Vec<usize> {
        let search = AABB::from_corners([point.x - dx, point.y - dy], [point.x + dx, point.y + dy]);
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&search)
            .map(|entry| entry.slot)
            .collect();
        slots.sort_unstable();
        slots
    }
}
