/// Geographic point in degrees (WGS84), with an optional height in meters.
///
/// This is the only coordinate type that crosses component boundaries. Fields
/// are private so every value in circulation has passed range validation:
/// longitude in `[-180, 180]`, latitude in `[-90, 90]`, everything finite.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    lon_deg: f64,
    lat_deg: f64,
    alt_m: Option<f64>,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Result<Self, InvalidCoordinate> {
        let lon_ok = lon_deg.is_finite() && (-180.0..=180.0).contains(&lon_deg);
        let lat_ok = lat_deg.is_finite() && (-90.0..=90.0).contains(&lat_deg);
        if !(lon_ok && lat_ok) {
            return Err(InvalidCoordinate {
                lon_deg,
                lat_deg,
                alt_m: None,
            });
        }
        Ok(Self {
            lon_deg,
            lat_deg,
            alt_m: None,
        })
    }

    pub fn with_altitude(self, alt_m: f64) -> Result<Self, InvalidCoordinate> {
        if !alt_m.is_finite() {
            return Err(InvalidCoordinate {
                lon_deg: self.lon_deg,
                lat_deg: self.lat_deg,
                alt_m: Some(alt_m),
            });
        }
        Ok(Self {
            alt_m: Some(alt_m),
            ..self
        })
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon_deg
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat_deg
    }

    pub fn alt_m(&self) -> Option<f64> {
        self.alt_m
    }

    /// Same horizontal position, no height.
    pub fn ground(self) -> Self {
        Self { alt_m: None, ..self }
    }

    /// Component-wise comparison within `eps_deg` (heights ignored).
    pub fn approx_eq(&self, other: &GeoPoint, eps_deg: f64) -> bool {
        (self.lon_deg - other.lon_deg).abs() <= eps_deg
            && (self.lat_deg - other.lat_deg).abs() <= eps_deg
    }
}

/// A longitude/latitude/height triple outside the valid geographic range.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InvalidCoordinate {
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub alt_m: Option<f64>,
}

impl std::fmt::Display for InvalidCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.alt_m {
            Some(alt) => write!(
                f,
                "invalid coordinate: lon {}, lat {}, alt {alt} m",
                self.lon_deg, self.lat_deg
            ),
            None => write!(
                f,
                "invalid coordinate: lon {}, lat {} (expected lon in [-180, 180], lat in [-90, 90])",
                self.lon_deg, self.lat_deg
            ),
        }
    }
}

impl std::error::Error for InvalidCoordinate {}

#[cfg(test)]
mod tests {
    use super::GeoPoint;

    #[test]
    fn accepts_range_bounds() {
        assert!(GeoPoint::new(-180.0, -90.0).is_ok());
        assert!(GeoPoint::new(180.0, 90.0).is_ok());
        assert!(GeoPoint::new(-122.42, 37.77).is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(GeoPoint::new(180.0001, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -90.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());

        let err = GeoPoint::new(200.0, 10.0).unwrap_err();
        assert_eq!(err.lon_deg, 200.0);
        assert!(err.to_string().contains("lon 200"));
    }

    #[test]
    fn altitude_must_be_finite() {
        let p = GeoPoint::new(10.0, 20.0).unwrap();
        assert_eq!(p.with_altitude(1000.0).unwrap().alt_m(), Some(1000.0));
        assert!(p.with_altitude(f64::NAN).is_err());
        assert_eq!(p.with_altitude(5.0).unwrap().ground().alt_m(), None);
    }
}
