//! Planar polygon geometry
//!
//! Coordinates are `(x, y)` pairs: longitude/latitude for geographic data,
//! metres once projected with [`crate::projection::LocalProjection`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A 2D coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Geographic point from longitude and latitude
    pub fn lon_lat(lon: f64, lat: f64) -> Self {
        Self { x: lon, y: lat }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Coord,
    pub max: Coord,
}

impl BoundingBox {
    pub fn contains(&self, point: &Coord) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: Coord::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Coord::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn center(&self) -> Coord {
        Coord::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }
}

/// A closed ring; the first coordinate is repeated at the end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    coords: Vec<Coord>,
}

impl Ring {
    /// Build a ring, closing it if needed
    ///
    /// Fails on non-finite coordinates or fewer than three distinct vertices.
    pub fn new(mut coords: Vec<Coord>) -> Result<Self> {
        if let Some(bad) = coords.iter().find(|c| !c.is_finite()) {
            return Err(Error::InvalidGeometry(format!(
                "non-finite coordinate ({}, {})",
                bad.x, bad.y
            )));
        }
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last {
                coords.push(first);
            }
        }
        if coords.len() < 4 {
            return Err(Error::InvalidGeometry(format!(
                "ring needs at least 3 distinct vertices, got {}",
                coords.len().saturating_sub(1)
            )));
        }
        Ok(Self { coords })
    }

    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    fn segments(&self) -> impl Iterator<Item = (&Coord, &Coord)> {
        self.coords.iter().zip(self.coords.iter().skip(1))
    }

    /// Even-odd ray casting
    pub fn contains(&self, point: &Coord) -> bool {
        let mut inside = false;
        for (a, b) in self.segments() {
            if (a.y > point.y) != (b.y > point.y) {
                let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if point.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Shortest distance from `point` to the ring boundary
    pub fn boundary_distance(&self, point: &Coord) -> f64 {
        self.segments()
            .map(|(a, b)| segment_distance(point, a, b))
            .fold(f64::INFINITY, f64::min)
    }

    /// Unsigned shoelace area
    pub fn area(&self) -> f64 {
        let twice: f64 = self.segments().map(|(a, b)| a.x * b.y - b.x * a.y).sum();
        twice.abs() / 2.0
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut min = self.coords[0];
        let mut max = self.coords[0];
        for c in &self.coords[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        BoundingBox { min, max }
    }

    pub fn map_coords(&self, f: &impl Fn(Coord) -> Coord) -> Ring {
        Ring {
            coords: self.coords.iter().map(|&c| f(c)).collect(),
        }
    }
}

/// Polygon with optional holes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Self { exterior, holes }
    }

    pub fn contains(&self, point: &Coord) -> bool {
        self.exterior.contains(point) && !self.holes.iter().any(|h| h.contains(point))
    }

    /// Zero inside, otherwise distance to the nearest boundary
    pub fn distance(&self, point: &Coord) -> f64 {
        if self.contains(point) {
            return 0.0;
        }
        std::iter::once(&self.exterior)
            .chain(self.holes.iter())
            .map(|r| r.boundary_distance(point))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(Ring::area).sum();
        (self.exterior.area() - holes).max(0.0)
    }

    pub fn map_coords(&self, f: &impl Fn(Coord) -> Coord) -> Polygon {
        Polygon {
            exterior: self.exterior.map_coords(f),
            holes: self.holes.iter().map(|h| h.map_coords(f)).collect(),
        }
    }
}

/// One or more polygons forming a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    polygons: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn new(polygons: Vec<Polygon>) -> Result<Self> {
        if polygons.is_empty() {
            return Err(Error::InvalidGeometry("empty multipolygon".to_string()));
        }
        Ok(Self { polygons })
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn contains(&self, point: &Coord) -> bool {
        self.polygons.iter().any(|p| p.contains(point))
    }

    pub fn distance(&self, point: &Coord) -> f64 {
        self.polygons
            .iter()
            .map(|p| p.distance(point))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn area(&self) -> f64 {
        self.polygons.iter().map(Polygon::area).sum()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut parts = self.polygons.iter().map(|p| p.exterior.bounding_box());
        // `new` guarantees at least one part
        let first = parts.next().unwrap_or(BoundingBox {
            min: Coord::new(0.0, 0.0),
            max: Coord::new(0.0, 0.0),
        });
        parts.fold(first, |acc, b| acc.merge(&b))
    }

    pub fn map_coords(&self, f: impl Fn(Coord) -> Coord) -> MultiPolygon {
        MultiPolygon {
            polygons: self.polygons.iter().map(|p| p.map_coords(&f)).collect(),
        }
    }
}

impl From<Polygon> for MultiPolygon {
    fn from(polygon: Polygon) -> Self {
        Self {
            polygons: vec![polygon],
        }
    }
}

fn segment_distance(p: &Coord, a: &Coord, b: &Coord) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(&Coord::new(a.x + t * dx, a.y + t * dy))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn square(x0: f64, y0: f64, size: f64) -> Ring {
        Ring::new(vec![
            Coord::new(x0, y0),
            Coord::new(x0 + size, y0),
            Coord::new(x0 + size, y0 + size),
            Coord::new(x0, y0 + size),
        ])
        .unwrap()
    }

    #[test]
    fn test_ring_closes_itself() {
        let ring = square(0.0, 0.0, 1.0);
        assert_eq!(ring.coords().len(), 5);
        assert_eq!(ring.coords()[0], ring.coords()[4]);
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let result = Ring::new(vec![Coord::new(0.0, 0.0), Coord::new(1.0, 0.0)]);
        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
        let result = Ring::new(vec![
            Coord::new(0.0, 0.0),
            Coord::new(f64::NAN, 0.0),
            Coord::new(1.0, 1.0),
        ]);
        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_contains_with_hole() {
        let polygon = Polygon::new(square(0.0, 0.0, 10.0), vec![square(4.0, 4.0, 2.0)]);
        assert!(polygon.contains(&Coord::new(1.0, 1.0)));
        assert!(!polygon.contains(&Coord::new(5.0, 5.0)));
        assert!(!polygon.contains(&Coord::new(11.0, 5.0)));
    }

    #[test]
    fn test_distance() {
        let polygon = Polygon::new(square(0.0, 0.0, 10.0), vec![square(4.0, 4.0, 2.0)]);
        assert_eq!(polygon.distance(&Coord::new(1.0, 1.0)), 0.0);
        assert!((polygon.distance(&Coord::new(13.0, 5.0)) - 3.0).abs() < 1e-12);
        assert!((polygon.distance(&Coord::new(13.0, 14.0)) - 5.0).abs() < 1e-12);
        // Inside the hole: distance to the hole boundary
        assert!((polygon.distance(&Coord::new(5.0, 5.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_area() {
        let polygon = Polygon::new(square(0.0, 0.0, 10.0), vec![square(4.0, 4.0, 2.0)]);
        assert_eq!(polygon.area(), 96.0);
        let far = Polygon::new(square(20.0, 0.0, 1.0), vec![]);
        let multi = MultiPolygon::new(vec![polygon, far]).unwrap();
        assert_eq!(multi.area(), 97.0);
    }

    #[test]
    fn test_multipolygon_contains_and_bbox() {
        let multi = MultiPolygon::new(vec![
            Polygon::new(square(0.0, 0.0, 1.0), vec![]),
            Polygon::new(square(5.0, 5.0, 1.0), vec![]),
        ])
        .unwrap();
        assert!(multi.contains(&Coord::new(5.5, 5.5)));
        assert!(!multi.contains(&Coord::new(3.0, 3.0)));
        let bbox = multi.bounding_box();
        assert_eq!(bbox.min, Coord::new(0.0, 0.0));
        assert_eq!(bbox.max, Coord::new(6.0, 6.0));
        assert!(MultiPolygon::new(vec![]).is_err());
    }

    #[test]
    fn test_map_coords() {
        let multi: MultiPolygon = Polygon::new(square(0.0, 0.0, 1.0), vec![]).into();
        let scaled = multi.map_coords(|c| Coord::new(c.x * 2.0, c.y * 3.0));
        assert_eq!(scaled.area(), 6.0);
    }
}
