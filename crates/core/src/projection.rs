//! Local metric projection
//!
//! An equirectangular frame centred on a reference latitude, with the WGS84
//! series expansions for metres per degree. Within a few kilometres of the
//! reference point the distortion stays well under a metre.

use crate::geometry::{BoundingBox, Coord, MultiPolygon};

/// Smallest metres-per-degree-of-latitude on the WGS84 ellipsoid (equator)
pub const MIN_METERS_PER_DEGREE_LAT: f64 = 110_574.0;

/// Metric frame tangent to a reference point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    origin: Coord,
    meters_per_deg_lon: f64,
    meters_per_deg_lat: f64,
}

impl LocalProjection {
    /// Frame centred on a lon/lat origin
    pub fn new(origin: Coord) -> Self {
        let (meters_per_deg_lon, meters_per_deg_lat) = meters_per_degree(origin.y);
        Self {
            origin,
            meters_per_deg_lon,
            meters_per_deg_lat,
        }
    }

    /// Frame centred on a bounding box
    pub fn centered_on(bbox: &BoundingBox) -> Self {
        Self::new(bbox.center())
    }

    /// Lon/lat to local metres
    pub fn forward(&self, lon_lat: Coord) -> Coord {
        Coord::new(
            (lon_lat.x - self.origin.x) * self.meters_per_deg_lon,
            (lon_lat.y - self.origin.y) * self.meters_per_deg_lat,
        )
    }

    /// Local metres back to lon/lat
    pub fn inverse(&self, meters: Coord) -> Coord {
        Coord::new(
            self.origin.x + meters.x / self.meters_per_deg_lon,
            self.origin.y + meters.y / self.meters_per_deg_lat,
        )
    }

    pub fn project(&self, geometry: &MultiPolygon) -> MultiPolygon {
        geometry.map_coords(|c| self.forward(c))
    }
}

/// `(metres per degree of longitude, metres per degree of latitude)`
pub fn meters_per_degree(lat_degrees: f64) -> (f64, f64) {
    let phi = lat_degrees.to_radians();
    let lat = 111_132.92 - 559.82 * (2.0 * phi).cos() + 1.175 * (4.0 * phi).cos()
        - 0.0023 * (6.0 * phi).cos();
    let lon = 111_412.84 * phi.cos() - 93.5 * (3.0 * phi).cos() + 0.118 * (5.0 * phi).cos();
    (lon, lat)
}

/// Degree offsets that cover at least `meters` around a latitude
///
/// Used to widen index queries before exact metric checks.
pub fn degree_margin(lat_degrees: f64, meters: f64) -> (f64, f64) {
    let (lon_m, _) = meters_per_degree(lat_degrees.abs().min(89.0));
    // 1% slack for curvature across the margin
    let slack = 1.01;
    (
        meters / lon_m.max(1.0) * slack,
        meters / MIN_METERS_PER_DEGREE_LAT * slack,
    )
}

/// Area in square kilometres, measured in a frame centred on the geometry
pub fn area_km2(geometry: &MultiPolygon) -> f64 {
    let projection = LocalProjection::centered_on(&geometry.bounding_box());
    projection.project(geometry).area() / 1_000_000.0
}
