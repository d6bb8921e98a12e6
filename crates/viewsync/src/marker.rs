use foundation::GeoPoint;
use foundation::math::{to_engine_flat, to_engine_globe};

use crate::engine::{EngineSet, FlatEngine, FlatMarker, GlobeEngine, PointMarker};
use crate::style::MarkerStyle;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocationMarker {
    pub position: GeoPoint,
    pub visible: bool,
}

/// The single "you are here" marker, mirrored into both engines.
///
/// Each update replaces the engines' marker wholesale, so neither engine ever
/// shows a second one. Positions are converted before any engine is touched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationMarkerStore {
    marker: Option<LocationMarker>,
    style: MarkerStyle,
}

impl LocationMarkerStore {
    pub fn new(style: MarkerStyle) -> Self {
        Self {
            marker: None,
            style,
        }
    }

    pub fn marker(&self) -> Option<LocationMarker> {
        self.marker
    }

    pub fn current_location(&self) -> Option<GeoPoint> {
        self.marker.map(|m| m.position)
    }

    pub fn style(&self) -> &MarkerStyle {
        &self.style
    }

    /// Places (or moves) the marker. It becomes visible.
    pub fn set_location<F: FlatEngine, G: GlobeEngine>(
        &mut self,
        engines: &mut EngineSet<F, G>,
        position: GeoPoint,
    ) {
        self.marker = Some(LocationMarker {
            position,
            visible: true,
        });
        self.publish(engines);
    }

    /// Removes the marker. Without one this is a no-op.
    pub fn clear<F: FlatEngine, G: GlobeEngine>(&mut self, engines: &mut EngineSet<F, G>) -> bool {
        if self.marker.take().is_none() {
            return false;
        }
        self.publish(engines);
        true
    }

    /// Returns false when there is no marker to show or hide.
    pub fn set_visible<F: FlatEngine, G: GlobeEngine>(
        &mut self,
        engines: &mut EngineSet<F, G>,
        visible: bool,
    ) -> bool {
        let Some(marker) = self.marker.as_mut() else {
            return false;
        };
        if marker.visible != visible {
            marker.visible = visible;
            self.publish(engines);
        }
        true
    }

    /// Re-publishes the marker, e.g. after the globe was enabled.
    pub fn refresh<F: FlatEngine, G: GlobeEngine>(&self, engines: &mut EngineSet<F, G>) {
        self.publish(engines);
    }

    /// Forgets the marker without touching any engine (used at teardown).
    pub fn discard(&mut self) {
        self.marker = None;
    }

    fn publish<F: FlatEngine, G: GlobeEngine>(&self, engines: &mut EngineSet<F, G>) {
        let shown = self.marker.filter(|m| m.visible);
        let flat = shown.map(|m| FlatMarker {
            position: to_engine_flat(m.position),
            style: self.style.circle(),
        });
        let point = shown.map(|m| PointMarker {
            position: to_engine_globe(m.position.ground()),
            style: self.style.point(),
        });

        engines.flat_mut().set_location_feature(flat);
        if engines.globe_enabled() {
            engines.globe_mut().set_point_marker(point);
        }
    }
}
