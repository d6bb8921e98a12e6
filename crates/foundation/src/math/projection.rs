//! Web Mercator (EPSG:3857), the flat engine's native coordinate space.
//!
//! Latitude is projected as `R * asinh(tan(lat))`, which is the usual
//! `R * ln(tan(pi/4 + lat/2))` written so that it stays finite at the poles.
//! Nothing here clamps: the flat engine decides what part of the plane it
//! shows, and the transform stays reciprocal for every valid [`GeoPoint`].

use super::WGS84_A;
use crate::geo::{GeoPoint, InvalidCoordinate};

/// Half the Web Mercator world width (meters).
pub const MERCATOR_HALF_WORLD_M: f64 = std::f64::consts::PI * WGS84_A;

/// Position in the flat engine's coordinate space (Web Mercator meters).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlatCoord {
    pub x_m: f64,
    pub y_m: f64,
}

impl FlatCoord {
    pub fn new(x_m: f64, y_m: f64) -> Self {
        Self { x_m, y_m }
    }
}

pub fn to_engine_flat(point: GeoPoint) -> FlatCoord {
    let lat = point.lat_deg().to_radians();
    FlatCoord::new(
        WGS84_A * point.lon_deg().to_radians(),
        WGS84_A * lat.tan().asinh(),
    )
}

/// Projects raw degrees, validating them first.
pub fn lon_lat_to_flat(lon_deg: f64, lat_deg: f64) -> Result<FlatCoord, InvalidCoordinate> {
    GeoPoint::new(lon_deg, lat_deg).map(to_engine_flat)
}

/// Inverse projection.
///
/// `x` past the world edge (a view panned across the antimeridian) wraps back
/// into `[-180, 180]`. Non-finite input is rejected.
pub fn from_engine_flat(coord: FlatCoord) -> Result<GeoPoint, InvalidCoordinate> {
    if !(coord.x_m.is_finite() && coord.y_m.is_finite()) {
        return Err(InvalidCoordinate {
            lon_deg: coord.x_m,
            lat_deg: coord.y_m,
            alt_m: None,
        });
    }

    let mut lon_deg = (coord.x_m / WGS84_A).to_degrees();
    if lon_deg.abs() > 180.0 + 1e-9 {
        lon_deg = wrap_lon_deg(lon_deg);
    }
    // Rounding noise at exactly +-180 stays on its own side of the antimeridian.
    let lon = lon_deg.clamp(-180.0, 180.0);
    // sinh overflows to infinity far past the poles; atan still lands on +-90.
    let lat = (coord.y_m / WGS84_A).sinh().atan().to_degrees();
    GeoPoint::new(lon, lat.clamp(-90.0, 90.0))
}

fn wrap_lon_deg(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}
