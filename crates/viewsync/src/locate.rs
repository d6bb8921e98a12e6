//! Geolocation: the provider contract and the flow that turns a fix into a
//! marker update plus a synchronized camera move.

use foundation::{GeoPoint, InvalidCoordinate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::camera::{CameraSyncBridge, CameraTarget, Flights};
use crate::controller::ViewModeController;
use crate::engine::EngineBackend;
use crate::error::ViewError;
use crate::marker::LocationMarkerStore;

/// A position reported by the platform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Fix {
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub altitude_m: Option<f64>,
    pub accuracy_m: Option<f64>,
}

impl Fix {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon_deg,
            lat_deg,
            altitude_m: None,
            accuracy_m: None,
        }
    }

    /// Validates the fix. Out-of-range values are rejected, never clamped.
    pub fn to_geo_point(&self) -> Result<GeoPoint, InvalidCoordinate> {
        let point = GeoPoint::new(self.lon_deg, self.lat_deg)?;
        match self.altitude_m {
            Some(alt) => point.with_altitude(alt),
            None => Ok(point),
        }
    }
}

/// W3C `GeolocationPositionError` codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionErrorKind {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl PositionErrorKind {
    /// Unknown codes map to `PositionUnavailable`.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PositionErrorKind::PermissionDenied,
            3 => PositionErrorKind::Timeout,
            _ => PositionErrorKind::PositionUnavailable,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            PositionErrorKind::PermissionDenied => 1,
            PositionErrorKind::PositionUnavailable => 2,
            PositionErrorKind::Timeout => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?} (code {code}): {message}", code = .kind.code())]
pub struct PositionError {
    pub kind: PositionErrorKind,
    pub message: String,
}

impl PositionError {
    pub fn new(kind: PositionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Completion of a single position request. Runs at most once.
pub type FixCallback = Box<dyn FnOnce(Result<Fix, PositionError>)>;

pub trait GeolocationProvider {
    fn is_available(&self) -> bool;

    /// Requests one fix. The callback may run before this returns or on a
    /// later turn of the event loop.
    fn current_position(&mut self, on_complete: FixCallback);
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    /// Flat zoom level to animate to.
    pub zoom: f64,
    /// Globe camera height above the fix (meters).
    pub altitude_m: f64,
    pub duration_ms: u32,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            zoom: 14.0,
            altitude_m: 1000.0,
            duration_ms: 2000,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Located {
    pub request: u64,
    pub position: GeoPoint,
    pub flights: Flights,
}

/// Request bookkeeping for locate-me.
///
/// Overlapping requests are not cancelled: each completion is applied in the
/// order it arrives, so the last one to complete wins.
#[derive(Debug, Clone, PartialEq)]
pub struct GeolocationFlow {
    settings: LocateConfig,
    issued: u64,
    last_applied: Option<u64>,
}

impl GeolocationFlow {
    pub fn new(settings: LocateConfig) -> Self {
        Self {
            settings,
            issued: 0,
            last_applied: None,
        }
    }

    pub fn settings(&self) -> &LocateConfig {
        &self.settings
    }

    /// Allocates the id of a new request.
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Number of requests issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn target_for(&self, position: GeoPoint) -> Result<CameraTarget, ViewError> {
        CameraTarget::new(
            position.ground(),
            self.settings.zoom,
            self.settings.altitude_m,
            self.settings.duration_ms,
        )
    }

    /// Applies a completed request: validates the fix, moves the marker, and
    /// flies both cameras.
    pub fn complete<B: EngineBackend>(
        &mut self,
        request: u64,
        controller: &mut ViewModeController<B>,
        markers: &mut LocationMarkerStore,
        bridge: &CameraSyncBridge,
        result: Result<Fix, PositionError>,
    ) -> Result<Located, ViewError> {
        let fix = result.map_err(ViewError::PositionUnavailable)?;
        let position = fix.to_geo_point()?;
        let target = self.target_for(position)?;

        let state = controller.state();
        let Some(engines) = controller.engines_mut() else {
            return Err(ViewError::InvalidTransition {
                state,
                action: "apply a position fix",
            });
        };

        if self.last_applied.is_some_and(|last| last > request) {
            debug!(request, "older locate request completed last; applying it");
        }
        self.last_applied = Some(request);
        debug!(request, accuracy_m = ?fix.accuracy_m, "applying position fix");

        markers.set_location(engines, position);
        let flights = bridge.fly_to(engines, &target);
        Ok(Located {
            request,
            position,
            flights,
        })
    }
}

#[cfg(test)]
mod tests {
    use foundation::GeoPoint;

    use super::{Fix, GeolocationFlow, LocateConfig, PositionError, PositionErrorKind};

    #[test]
    fn fix_validation_rejects_out_of_range() {
        assert!(Fix::new(-122.42, 37.77).to_geo_point().is_ok());
        assert!(Fix::new(200.0, 0.0).to_geo_point().is_err());
        assert!(Fix::new(0.0, f64::NAN).to_geo_point().is_err());
    }

    #[test]
    fn error_codes_follow_w3c() {
        assert_eq!(PositionErrorKind::from_code(1), PositionErrorKind::PermissionDenied);
        assert_eq!(PositionErrorKind::from_code(2), PositionErrorKind::PositionUnavailable);
        assert_eq!(PositionErrorKind::from_code(3), PositionErrorKind::Timeout);
        assert_eq!(PositionErrorKind::from_code(42), PositionErrorKind::PositionUnavailable);
        let err = PositionError::new(PositionErrorKind::PermissionDenied, "User denied");
        assert_eq!(err.to_string(), "PermissionDenied (code 1): User denied");
    }

    #[test]
    fn target_uses_configured_zoom_and_altitude() {
        let flow = GeolocationFlow::new(LocateConfig::default());
        let p = GeoPoint::new(-122.42, 37.77).unwrap();
        let target = flow.target_for(p).unwrap();
        assert_eq!(target.zoom(), 14.0);
        assert_eq!(target.altitude_m(), 1000.0);
        assert_eq!(target.duration_ms(), 2000);
        assert_eq!(target.duration_s(), 2.0);
    }

    #[test]
    fn request_ids_increase() {
        let mut flow = GeolocationFlow::new(LocateConfig::default());
        assert_eq!(flow.issued(), 0);
        assert_eq!(flow.begin(), 1);
        assert_eq!(flow.begin(), 2);
    }
}
