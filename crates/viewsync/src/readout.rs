use foundation::math::{FlatCoord, from_engine_flat};

use crate::controller::ViewModeController;
use crate::engine::{EngineBackend, FlatEngine, ListenerKey};
use crate::error::ViewError;

pub fn format_zoom(zoom: f64) -> String {
    format!("Zoom: {zoom:.2}")
}

/// Pointer readout for a flat-view coordinate; empty when the coordinate
/// cannot be converted.
pub fn format_pointer(coord: FlatCoord) -> String {
    match from_engine_flat(coord) {
        Ok(p) => format!("Lon: {:.4} , Lat: {:.4}", p.lon_deg(), p.lat_deg()),
        Err(_) => String::new(),
    }
}

/// Live "Zoom: N.NN" text driven by the flat view's resolution changes.
#[derive(Debug, Default)]
pub struct ZoomIndicator {
    key: Option<ListenerKey>,
}

impl ZoomIndicator {
    /// Publishes the current zoom, then every later change.
    pub fn attach<B: EngineBackend>(
        controller: &mut ViewModeController<B>,
        mut publish: impl FnMut(String) + 'static,
    ) -> Result<Self, ViewError> {
        let zoom = match controller.engines() {
            Some(engines) if controller.state().is_live() => engines.flat().zoom(),
            _ => {
                return Err(ViewError::InvalidTransition {
                    state: controller.state(),
                    action: "attach the zoom indicator",
                });
            }
        };

        publish(format_zoom(zoom));
        let key = controller.subscribe_resolution(Box::new(move |z: f64| publish(format_zoom(z))))?;
        Ok(Self { key: Some(key) })
    }

    pub fn is_attached(&self) -> bool {
        self.key.is_some()
    }

    /// Stops publishing. Only the first call detaches anything.
    pub fn detach<B: EngineBackend>(&mut self, controller: &mut ViewModeController<B>) -> bool {
        match self.key.take() {
            Some(key) => controller.unsubscribe(key),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use foundation::math::{FlatCoord, lon_lat_to_flat};
    use pretty_assertions::assert_eq;

    use super::{ZoomIndicator, format_pointer, format_zoom};
    use crate::controller::ViewModeController;
    use crate::engine::{FlatView, RenderTarget};
    use crate::sim::SimBackend;

    #[test]
    fn zoom_text_has_two_decimals() {
        assert_eq!(format_zoom(2.0), "Zoom: 2.00");
        assert_eq!(format_zoom(5.3749), "Zoom: 5.37");
    }

    #[test]
    fn pointer_text_has_four_decimals() {
        let c = lon_lat_to_flat(-122.42, 37.77).unwrap();
        assert_eq!(format_pointer(c), "Lon: -122.4200 , Lat: 37.7700");
        assert_eq!(format_pointer(FlatCoord::new(f64::NAN, 0.0)), "");
    }

    #[test]
    fn publishes_initial_then_each_change_once() {
        let mut backend = SimBackend::new();
        let mut controller = ViewModeController::new();
        let view = FlatView {
            center: FlatCoord::new(0.0, 0.0),
            zoom: 2.0,
        };
        controller
            .mount(&mut backend, &RenderTarget::new("map"), view, false)
            .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut indicator =
            ZoomIndicator::attach(&mut controller, move |t| sink.borrow_mut().push(t)).unwrap();

        backend.flat_probe().unwrap().user_zoom(5.37);
        assert_eq!(*seen.borrow(), vec!["Zoom: 2.00", "Zoom: 5.37"]);

        assert!(indicator.detach(&mut controller));
        assert!(!indicator.detach(&mut controller));
        backend.flat_probe().unwrap().user_zoom(7.0);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn attach_requires_a_mounted_view() {
        let mut controller = ViewModeController::<SimBackend>::new();
        assert!(ZoomIndicator::attach(&mut controller, |_| {}).is_err());
    }
}
