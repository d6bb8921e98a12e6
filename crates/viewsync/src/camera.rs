use foundation::GeoPoint;
use foundation::math::{geo_to_ecef, to_engine_flat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{EngineSet, FlatAnimation, FlatEngine, GlobeEngine, GlobeFlight};
use crate::error::ViewError;

/// Where both cameras should go. Zoom drives the flat view, altitude the
/// globe; one move carries both.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraTarget {
    focus: GeoPoint,
    zoom: f64,
    altitude_m: f64,
    duration_ms: u32,
}

impl CameraTarget {
    pub fn new(
        focus: GeoPoint,
        zoom: f64,
        altitude_m: f64,
        duration_ms: u32,
    ) -> Result<Self, ViewError> {
        if !zoom.is_finite() {
            return Err(ViewError::InvalidCameraTarget(format!("zoom {zoom}")));
        }
        if !altitude_m.is_finite() || altitude_m < 0.0 {
            return Err(ViewError::InvalidCameraTarget(format!(
                "altitude {altitude_m} m"
            )));
        }
        Ok(Self {
            focus,
            zoom,
            altitude_m,
            duration_ms,
        })
    }

    pub fn focus(&self) -> GeoPoint {
        self.focus
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn altitude_m(&self) -> f64 {
        self.altitude_m
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn duration_s(&self) -> f64 {
        f64::from(self.duration_ms) / 1000.0
    }
}

/// Zoom range the flat engine accepts.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomScale {
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for ZoomScale {
    fn default() -> Self {
        Self {
            min_zoom: 0.0,
            max_zoom: 28.0,
        }
    }
}

impl ZoomScale {
    /// Both bounds finite and ordered.
    pub fn is_valid(&self) -> bool {
        self.min_zoom.is_finite() && self.max_zoom.is_finite() && self.min_zoom <= self.max_zoom
    }

    /// Clamps `zoom` into the scale. Never panics, even on a scale that
    /// fails [`Self::is_valid`].
    pub fn apply(&self, zoom: f64) -> f64 {
        zoom.max(self.min_zoom).min(self.max_zoom)
    }

    pub fn contains(&self, zoom: f64) -> bool {
        (self.min_zoom..=self.max_zoom).contains(&zoom)
    }
}

/// The moves issued for one [`CameraTarget`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Flights {
    pub flat: FlatAnimation,
    /// `None` when the globe was disabled and left untouched.
    pub globe: Option<GlobeFlight>,
}

/// Translates a [`CameraTarget`] into each engine's native camera move.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct CameraSyncBridge {
    zoom_scale: ZoomScale,
}

impl CameraSyncBridge {
    pub fn new(zoom_scale: ZoomScale) -> Result<Self, ViewError> {
        if !zoom_scale.is_valid() {
            return Err(ViewError::InvalidConfig(format!(
                "flat zoom scale [{}, {}]",
                zoom_scale.min_zoom, zoom_scale.max_zoom
            )));
        }
        Ok(Self { zoom_scale })
    }

    /// Computes the moves without touching any engine.
    pub fn plan(&self, target: &CameraTarget, globe_enabled: bool) -> Flights {
        let flat = FlatAnimation {
            center: to_engine_flat(target.focus),
            zoom: self.zoom_scale.apply(target.zoom),
            duration_ms: target.duration_ms,
        };
        let globe = globe_enabled.then(|| GlobeFlight {
            destination: geo_to_ecef(target.focus, target.altitude_m),
            duration_s: target.duration_s(),
        });
        Flights { flat, globe }
    }

    /// Starts the flat animation, and the globe flight when the globe is
    /// enabled. Both are issued in the same turn.
    pub fn fly_to<F: FlatEngine, G: GlobeEngine>(
        &self,
        engines: &mut EngineSet<F, G>,
        target: &CameraTarget,
    ) -> Flights {
        let flights = self.plan(target, engines.globe_enabled());
        engines.flat_mut().animate(flights.flat);
        if let Some(flight) = flights.globe {
            engines.globe_mut().fly_to(flight);
        }
        debug!(
            lon = target.focus.lon_deg(),
            lat = target.focus.lat_deg(),
            zoom = flights.flat.zoom,
            globe = flights.globe.is_some(),
            "camera move issued"
        );
        flights
    }
}
