use super::{Ecef, GlobeCoord};
use crate::geo::{GeoPoint, InvalidCoordinate};

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);
/// WGS84 second eccentricity squared.
pub const WGS84_EP2: f64 = (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);

/// Globe-engine position of a geographic point.
///
/// The point's height (if any) is taken above the ellipsoid; a point without
/// height lands on the ellipsoid surface.
pub fn to_engine_globe(point: GeoPoint) -> GlobeCoord {
    geo_to_ecef(point, point.alt_m().unwrap_or(0.0))
}

/// Inverse of [`to_engine_globe`]. The returned point always carries a height.
pub fn from_engine_globe(coord: GlobeCoord) -> Result<GeoPoint, InvalidCoordinate> {
    let finite = coord.x.is_finite() && coord.y.is_finite() && coord.z.is_finite();
    if !finite || coord.norm() == 0.0 {
        return Err(InvalidCoordinate {
            lon_deg: f64::NAN,
            lat_deg: f64::NAN,
            alt_m: None,
        });
    }

    let (lat_rad, lon_rad, height_m) = ecef_to_lat_lon_height(coord);
    let point = GeoPoint::new(
        lon_rad.to_degrees().clamp(-180.0, 180.0),
        lat_rad.to_degrees().clamp(-90.0, 90.0),
    )?;
    point.with_altitude(height_m)
}

/// Geographic point plus an explicit height to ECEF.
pub fn geo_to_ecef(point: GeoPoint, height_m: f64) -> Ecef {
    let (sin_lat, cos_lat) = point.lat_deg().to_radians().sin_cos();
    let (sin_lon, cos_lon) = point.lon_deg().to_radians().sin_cos();

    // Prime vertical radius of curvature.
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    Ecef::new(
        (n + height_m) * cos_lat * cos_lon,
        (n + height_m) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + height_m) * sin_lat,
    )
}

/// Bowring's single-iteration inverse; returns `(lat_rad, lon_rad, height_m)`.
fn ecef_to_lat_lon_height(ecef: Ecef) -> (f64, f64, f64) {
    let p = ecef.x.hypot(ecef.y);
    let lon = ecef.y.atan2(ecef.x);

    let theta = (ecef.z * WGS84_A).atan2(p * WGS84_B);
    let (sin_t, cos_t) = theta.sin_cos();
    let lat = (ecef.z + WGS84_EP2 * WGS84_B * sin_t.powi(3))
        .atan2(p - WGS84_E2 * WGS84_A * cos_t.powi(3));

    let (sin_lat, cos_lat) = lat.sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let height = if cos_lat.abs() > 1e-10 {
        p / cos_lat - n
    } else {
        // On the polar axis the horizontal term degenerates.
        ecef.z.abs() - WGS84_B
    };

    (lat, lon, height)
}

#[cfg(test)]
mod tests {
    use super::{WGS84_A, WGS84_B, from_engine_globe, to_engine_globe};
    use crate::geo::GeoPoint;
    use crate::math::Ecef;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn equator_prime_meridian_sits_on_x_axis() {
        let ecef = to_engine_globe(GeoPoint::new(0.0, 0.0).unwrap());
        assert_close(ecef.x, WGS84_A, 1e-6);
        assert_close(ecef.y, 0.0, 1e-6);
        assert_close(ecef.z, 0.0, 1e-6);
    }

    #[test]
    fn north_pole_sits_on_z_axis() {
        let ecef = to_engine_globe(GeoPoint::new(0.0, 90.0).unwrap());
        assert_close(ecef.x, 0.0, 1e-6);
        assert_close(ecef.z, WGS84_B, 1e-6);
    }

    #[test]
    fn height_moves_point_outward() {
        let ground = to_engine_globe(GeoPoint::new(-122.42, 37.77).unwrap());
        let air = to_engine_globe(
            GeoPoint::new(-122.42, 37.77)
                .unwrap()
                .with_altitude(1000.0)
                .unwrap(),
        );
        let gap = Ecef::new(air.x - ground.x, air.y - ground.y, air.z - ground.z);
        assert_close(gap.norm(), 1000.0, 1e-6);
    }

    #[test]
    fn globe_round_trip() {
        let p = GeoPoint::new(-60.0, 30.0)
            .unwrap()
            .with_altitude(120.0)
            .unwrap();
        let back = from_engine_globe(to_engine_globe(p)).unwrap();
        assert!(back.approx_eq(&p, 1e-7));
        assert_close(back.alt_m().unwrap(), 120.0, 1e-4);
    }

    #[test]
    fn earth_center_has_no_geographic_position() {
        assert!(from_engine_globe(Ecef::new(0.0, 0.0, 0.0)).is_err());
        assert!(from_engine_globe(Ecef::new(f64::NAN, 0.0, 0.0)).is_err());
    }
}
