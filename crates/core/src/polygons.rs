//! The read-only polygon set used for one run
//!
//! Polygons are stored in administrative-key order, so "lowest slot" and
//! "first by polygon id" mean the same thing in every tie-break.

use crate::geometry::Coord;
use crate::model::PolygonRecord;
use crate::projection::{self, LocalProjection};
use crate::spatial_index::PolygonIndex;
use crate::{Error, Result};
use std::collections::HashMap;
use tracing::info;

/// Polygon geometry in its own metric frame
#[derive(Debug, Clone)]
struct PreparedPolygon {
    projection: LocalProjection,
    projected: crate::geometry::MultiPolygon,
    area_km2: f64,
}

/// Indexed polygon set
#[derive(Debug, Clone)]
pub struct PolygonSet {
    polygons: Vec<PolygonRecord>,
    prepared: Vec<PreparedPolygon>,
    by_id: HashMap<String, usize>,
    index: PolygonIndex,
}

impl PolygonSet {
    /// Index polygons
    ///
    /// Fails with a schema error on a blank or repeated administrative key.
    pub fn new(mut polygons: Vec<PolygonRecord>) -> Result<Self> {
        polygons.sort_by(|a, b| a.id.cmp(&b.id));

        let mut by_id = HashMap::with_capacity(polygons.len());
        for (slot, polygon) in polygons.iter().enumerate() {
            if polygon.id.trim().is_empty() {
                return Err(Error::Schema(format!(
                    "polygon '{}' has an empty identifier",
                    polygon.name
                )));
            }
            if by_id.insert(polygon.id.clone(), slot).is_some() {
                return Err(Error::Schema(format!(
                    "duplicate polygon identifier '{}'",
                    polygon.id
                )));
            }
        }

        let prepared = polygons
            .iter()
            .map(|p| {
                let projection = LocalProjection::centered_on(&p.geometry.bounding_box());
                let projected = projection.project(&p.geometry);
                let area_km2 = projected.area() / 1_000_000.0;
                PreparedPolygon {
                    projection,
                    projected,
                    area_km2,
                }
            })
            .collect();

        let index = PolygonIndex::build(
            polygons
                .iter()
                .enumerate()
                .map(|(slot, p)| (slot, p.geometry.bounding_box())),
        );

        info!("Indexed {} polygons", polygons.len());

        Ok(Self {
            polygons,
            prepared,
            by_id,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn get(&self, slot: usize) -> &PolygonRecord {
        &self.polygons[slot]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolygonRecord> {
        self.polygons.iter()
    }

    /// Slot of an administrative key
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Area in km²: the recorded attribute, else measured from the geometry
    pub fn area_km2(&self, slot: usize) -> f64 {
        self.polygons[slot]
            .attributes
            .area_km2
            .unwrap_or(self.prepared[slot].area_km2)
    }

    /// Slots whose geometry contains the lon/lat point, ascending
    pub fn containing(&self, point: &Coord) -> Vec<usize> {
        self.index
            .candidates_at(point)
            .into_iter()
            .filter(|&slot| self.polygons[slot].geometry.contains(point))
            .collect()
    }

    /// Metric distance from a lon/lat point to a polygon (0 inside)
    pub fn distance_m(&self, slot: usize, point: &Coord) -> f64 {
        let prepared = &self.prepared[slot];
        prepared.projected.distance(&prepared.projection.forward(*point))
    }

    /// Polygons within `meters` of the point, nearest first, ties by slot
    pub fn within_distance(&self, point: &Coord, meters: f64) -> Vec<(usize, f64)> {
        let (dx, dy) = projection::degree_margin(point.y, meters);
        let mut hits: Vec<(usize, f64)> = self
            .index
            .candidates_within(point, dx, dy)
            .into_iter()
            .map(|slot| (slot, self.distance_m(slot, point)))
            .filter(|&(_, d)| d <= meters)
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits
    }

    /// Nearest polygon and its distance in metres, scanning every polygon
    pub fn nearest(&self, point: &Coord) -> Option<(usize, f64)> {
        (0..self.polygons.len())
            .map(|slot| (slot, self.distance_m(slot, point)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }
}
