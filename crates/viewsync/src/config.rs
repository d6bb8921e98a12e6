//! Viewer settings, loaded from JSON. Every field has a default, so an empty
//! object (or no file at all) gives the stock world view.

use std::path::{Path, PathBuf};

use foundation::{GeoPoint, InvalidCoordinate};
use foundation::math::to_engine_flat;
use serde::{Deserialize, Serialize};

use crate::camera::ZoomScale;
use crate::engine::FlatView;
use crate::locate::LocateConfig;
use crate::style::MarkerStyle;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialView {
    pub center_lon_deg: f64,
    pub center_lat_deg: f64,
    pub zoom: f64,
}

impl Default for InitialView {
    fn default() -> Self {
        Self {
            center_lon_deg: 0.0,
            center_lat_deg: 0.0,
            zoom: 2.0,
        }
    }
}

impl InitialView {
    pub fn center(&self) -> Result<GeoPoint, InvalidCoordinate> {
        GeoPoint::new(self.center_lon_deg, self.center_lat_deg)
    }

    pub fn to_flat_view(&self) -> Result<FlatView, InvalidCoordinate> {
        Ok(FlatView {
            center: to_engine_flat(self.center()?),
            zoom: self.zoom,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub initial_view: InitialView,
    pub start_in_globe: bool,
    pub flat_zoom: ZoomScale,
    pub locate: LocateConfig,
    pub marker: MarkerStyle,
    /// View events kept until the host drains them; older ones are dropped.
    /// Observers see every event regardless. `0` keeps nothing.
    pub event_buffer: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_view: InitialView::default(),
            start_in_globe: false,
            flat_zoom: ZoomScale::default(),
            locate: LocateConfig::default(),
            marker: MarkerStyle::default(),
            event_buffer: 256,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if let Err(err) = self.initial_view.center() {
            return invalid(format!("initial_view: {err}"));
        }
        let scale = self.flat_zoom;
        if !scale.is_valid() {
            return invalid(format!(
                "flat_zoom: min {} must not exceed max {}",
                scale.min_zoom, scale.max_zoom
            ));
        }
        if !scale.contains(self.initial_view.zoom) {
            return invalid(format!(
                "initial_view.zoom {} outside [{}, {}]",
                self.initial_view.zoom, scale.min_zoom, scale.max_zoom
            ));
        }
        if !self.locate.zoom.is_finite() {
            return invalid(format!("locate.zoom {}", self.locate.zoom));
        }
        if !self.locate.altitude_m.is_finite() || self.locate.altitude_m < 0.0 {
            return invalid(format!("locate.altitude_m {}", self.locate.altitude_m));
        }
        let m = &self.marker;
        for (name, value) in [
            ("marker.flat_radius_px", m.flat_radius_px),
            ("marker.globe_pixel_size", m.globe_pixel_size),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }
        if !(m.outline_width_px.is_finite() && m.outline_width_px >= 0.0) {
            return invalid(format!("marker.outline_width_px {}", m.outline_width_px));
        }
        Ok(())
    }
}
