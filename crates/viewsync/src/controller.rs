use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::{
    EngineBackend, EngineSet, FlatEngine, FlatView, GlobeEngine, ListenerKey, RenderTarget,
    ResolutionListener,
};
use crate::error::ViewError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Flat,
    Globe,
}

impl ViewMode {
    pub fn other(self) -> Self {
        match self {
            ViewMode::Flat => ViewMode::Globe,
            ViewMode::Globe => ViewMode::Flat,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    #[default]
    Uninitialized,
    FlatOnly,
    FlatPlusGlobe,
    Destroyed,
}

impl ControllerState {
    pub fn mode(self) -> Option<ViewMode> {
        match self {
            ControllerState::FlatOnly => Some(ViewMode::Flat),
            ControllerState::FlatPlusGlobe => Some(ViewMode::Globe),
            ControllerState::Uninitialized | ControllerState::Destroyed => None,
        }
    }

    /// Engines exist and accept calls.
    pub fn is_live(self) -> bool {
        self.mode().is_some()
    }

    fn for_globe(enabled: bool) -> Self {
        if enabled {
            ControllerState::FlatPlusGlobe
        } else {
            ControllerState::FlatOnly
        }
    }
}

/// Label and tooltip of the mode toggle. Both name the mode a click switches
/// to, not the current one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleButton {
    pub text: &'static str,
    pub title: &'static str,
}

impl ToggleButton {
    pub fn for_mode(current: ViewMode) -> Self {
        match current {
            ViewMode::Flat => Self {
                text: "3D",
                title: "Switch to 3D",
            },
            ViewMode::Globe => Self {
                text: "2D",
                title: "Switch to 2D",
            },
        }
    }
}

/// Outcome of [`ViewModeController::destroy`]. Faults are collected rather
/// than returned so one failing engine never blocks releasing the other.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TeardownReport {
    pub previous: ControllerState,
    pub listeners_detached: usize,
    pub faults: Vec<ViewError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    /// The controller was already destroyed; nothing was touched.
    pub fn was_noop(&self) -> bool {
        self.previous == ControllerState::Destroyed
    }
}

/// Owns the engine pair and its lifecycle:
/// `Uninitialized -> FlatOnly <-> FlatPlusGlobe -> Destroyed`.
pub struct ViewModeController<B: EngineBackend> {
    state: ControllerState,
    engines: Option<EngineSet<B::Flat, B::Globe>>,
    listeners: Vec<ListenerKey>,
}

impl<B: EngineBackend> Default for ViewModeController<B> {
    fn default() -> Self {
        Self {
            state: ControllerState::Uninitialized,
            engines: None,
            listeners: Vec::new(),
        }
    }
}

impl<B: EngineBackend> std::fmt::Debug for ViewModeController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewModeController")
            .field("state", &self.state)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl<B: EngineBackend> ViewModeController<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn mode(&self) -> Option<ViewMode> {
        self.state.mode()
    }

    pub fn engines(&self) -> Option<&EngineSet<B::Flat, B::Globe>> {
        self.engines.as_ref()
    }

    pub(crate) fn engines_mut(&mut self) -> Option<&mut EngineSet<B::Flat, B::Globe>> {
        self.engines.as_mut()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Builds the flat engine on `target`, layers a globe over it, and enables
    /// the globe if `start_in_globe`.
    ///
    /// On failure every engine built so far is released and the controller
    /// stays `Uninitialized`.
    pub fn mount(
        &mut self,
        backend: &mut B,
        target: &RenderTarget,
        view: FlatView,
        start_in_globe: bool,
    ) -> Result<ViewMode, ViewError> {
        if self.state != ControllerState::Uninitialized {
            return Err(ViewError::InvalidTransition {
                state: self.state,
                action: "mount",
            });
        }

        let mut flat = backend
            .create_flat(target, view)
            .map_err(ViewError::EngineInit)?;

        let mut globe = match backend.create_globe(&flat) {
            Ok(globe) => globe,
            Err(fault) => {
                release_flat(&mut flat);
                return Err(ViewError::EngineInit(fault));
            }
        };

        if globe.enabled() != start_in_globe {
            if let Err(fault) = globe.set_enabled(start_in_globe) {
                release_globe(&mut globe);
                release_flat(&mut flat);
                return Err(ViewError::EngineInit(fault));
            }
        }

        self.state = ControllerState::for_globe(globe.enabled());
        self.engines = Some(EngineSet::new(flat, globe));
        let mode = self.state.mode().unwrap_or(ViewMode::Flat);
        info!(target_id = %target.0, ?mode, "view mounted");
        Ok(mode)
    }

    /// Flips the globe on or off and returns the new mode.
    pub fn toggle(&mut self) -> Result<ViewMode, ViewError> {
        let state = self.state;
        let engines = match self.engines.as_mut() {
            Some(engines) if state.is_live() => engines,
            _ => {
                return Err(ViewError::InvalidTransition {
                    state,
                    action: "toggle",
                });
            }
        };

        let enable = !engines.globe_enabled();
        engines
            .globe_mut()
            .set_enabled(enable)
            .map_err(ViewError::Engine)?;
        let next = ControllerState::for_globe(engines.globe_enabled());

        self.state = next;
        debug!(from = ?state, to = ?next, "view mode toggled");
        Ok(next.mode().unwrap_or(ViewMode::Flat))
    }

    /// Registers a flat-view resolution listener that [`Self::destroy`] will
    /// detach.
    pub fn subscribe_resolution(
        &mut self,
        listener: ResolutionListener,
    ) -> Result<ListenerKey, ViewError> {
        let state = self.state;
        let engines = match self.engines.as_mut() {
            Some(engines) if state.is_live() => engines,
            _ => {
                return Err(ViewError::InvalidTransition {
                    state,
                    action: "subscribe to resolution changes",
                });
            }
        };

        let key = engines.flat_mut().on_resolution_change(listener);
        self.listeners.push(key);
        Ok(key)
    }

    pub fn unsubscribe(&mut self, key: ListenerKey) -> bool {
        let Some(index) = self.listeners.iter().position(|k| *k == key) else {
            return false;
        };
        self.listeners.swap_remove(index);
        match self.engines.as_mut() {
            Some(engines) => engines.flat_mut().remove_listener(key),
            None => false,
        }
    }

    /// Releases everything in order: globe disabled, globe destroyed,
    /// listeners detached, flat surface detached. Faults are logged and
    /// collected; the controller always ends `Destroyed`. Repeat calls are
    /// no-ops.
    pub fn destroy(&mut self) -> TeardownReport {
        let previous = self.state;
        if previous == ControllerState::Destroyed {
            debug!("destroy on an already destroyed view ignored");
            return TeardownReport {
                previous,
                ..TeardownReport::default()
            };
        }

        self.state = ControllerState::Destroyed;
        let mut report = TeardownReport {
            previous,
            ..TeardownReport::default()
        };

        let Some(engines) = self.engines.take() else {
            self.listeners.clear();
            return report;
        };
        let (mut flat, mut globe) = engines.into_parts();

        if let Err(fault) = globe.set_enabled(false) {
            warn!(%fault, "failed to disable globe during teardown");
            report.faults.push(ViewError::EngineTeardownFailure(fault));
        }
        if let Err(fault) = globe.destroy() {
            warn!(%fault, "failed to destroy globe");
            report.faults.push(ViewError::EngineTeardownFailure(fault));
        }
        drop(globe);

        for key in self.listeners.drain(..) {
            if flat.remove_listener(key) {
                report.listeners_detached += 1;
            }
        }

        if let Err(fault) = flat.detach_target() {
            warn!(%fault, "failed to detach flat view from its target");
            report.faults.push(ViewError::EngineTeardownFailure(fault));
        }
        drop(flat);

        info!(
            ?previous,
            listeners = report.listeners_detached,
            faults = report.faults.len(),
            "view destroyed"
        );
        report
    }
}

fn release_flat<F: FlatEngine>(flat: &mut F) {
    if let Err(fault) = flat.detach_target() {
        warn!(%fault, "failed to detach flat view after aborted mount");
    }
}

fn release_globe<G: GlobeEngine>(globe: &mut G) {
    if let Err(fault) = globe.destroy() {
        warn!(%fault, "failed to destroy globe after aborted mount");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use foundation::math::FlatCoord;
    use pretty_assertions::assert_eq;

    use super::{ControllerState, ToggleButton, ViewMode, ViewModeController};
    use crate::engine::{FlatView, RenderTarget};
    use crate::error::ViewError;
    use crate::sim::SimBackend;

    fn world() -> FlatView {
        FlatView {
            center: FlatCoord::new(0.0, 0.0),
            zoom: 2.0,
        }
    }

    fn mounted(start_in_globe: bool) -> (SimBackend, ViewModeController<SimBackend>) {
        let mut backend = SimBackend::new();
        let mut controller = ViewModeController::new();
        controller
            .mount(&mut backend, &RenderTarget::new("map"), world(), start_in_globe)
            .unwrap();
        (backend, controller)
    }

    #[test]
    fn mount_starts_flat_by_default() {
        let (backend, controller) = mounted(false);
        assert_eq!(controller.state(), ControllerState::FlatOnly);
        assert!(!backend.globe_probe().unwrap().enabled());
        assert!(backend.flat_probe().unwrap().is_attached());
    }

    #[test]
    fn mount_can_start_in_globe() {
        let (backend, controller) = mounted(true);
        assert_eq!(controller.mode(), Some(ViewMode::Globe));
        assert!(backend.globe_probe().unwrap().enabled());
    }

    #[test]
    fn mounting_twice_is_rejected() {
        let (mut backend, mut controller) = mounted(false);
        let err = controller
            .mount(&mut backend, &RenderTarget::new("map"), world(), false)
            .unwrap_err();
        assert!(matches!(err, ViewError::InvalidTransition { action: "mount", .. }));
    }

    #[test]
    fn failed_globe_construction_releases_flat() {
        let mut backend = SimBackend::new();
        backend.fail_globe_construction("no WebGL context");
        let mut controller = ViewModeController::new();
        let err = controller
            .mount(&mut backend, &RenderTarget::new("map"), world(), false)
            .unwrap_err();

        assert!(matches!(err, ViewError::EngineInit(_)));
        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert!(!backend.flat_probe().unwrap().is_attached());
    }

    #[test]
    fn double_toggle_restores_mode() {
        let (backend, mut controller) = mounted(false);
        assert_eq!(controller.toggle().unwrap(), ViewMode::Globe);
        assert_eq!(controller.toggle().unwrap(), ViewMode::Flat);
        assert_eq!(controller.state(), ControllerState::FlatOnly);
        assert!(!backend.globe_probe().unwrap().enabled());
    }

    #[test]
    fn failed_toggle_keeps_state() {
        let (backend, mut controller) = mounted(true);
        backend.globe_probe().unwrap().fail_disable("context lost");
        assert!(matches!(controller.toggle(), Err(ViewError::Engine(_))));
        assert_eq!(controller.state(), ControllerState::FlatPlusGlobe);
    }

    #[test]
    fn toggle_before_mount_is_rejected() {
        let mut controller = ViewModeController::<SimBackend>::new();
        assert!(matches!(
            controller.toggle(),
            Err(ViewError::InvalidTransition {
                state: ControllerState::Uninitialized,
                ..
            })
        ));
    }

    #[test]
    fn button_names_the_other_mode() {
        assert_eq!(ToggleButton::for_mode(ViewMode::Flat).text, "3D");
        assert_eq!(ToggleButton::for_mode(ViewMode::Flat).title, "Switch to 3D");
        assert_eq!(ToggleButton::for_mode(ViewMode::Globe).text, "2D");
        assert_eq!(ToggleButton::for_mode(ViewMode::Globe).title, "Switch to 2D");
    }

    #[test]
    fn teardown_disables_globe_first_and_detaches_last() {
        let (backend, mut controller) = mounted(true);
        controller.subscribe_resolution(Box::new(|_: f64| {})).unwrap();
        backend.clear_calls();

        let report = controller.destroy();
        assert!(report.is_clean());
        assert_eq!(report.listeners_detached, 1);
        assert_eq!(
            backend.calls(),
            vec![
                "globe.set_enabled(false)",
                "globe.destroy",
                "flat.remove_listener",
                "flat.detach_target",
            ]
        );
    }

    #[test]
    fn teardown_fault_does_not_block_release() {
        let (backend, mut controller) = mounted(true);
        let globe = backend.globe_probe().unwrap();
        globe.fail_disable("context lost");

        let report = controller.destroy();
        assert_eq!(report.faults.len(), 1);
        assert!(matches!(report.faults[0], ViewError::EngineTeardownFailure(_)));
        assert!(globe.is_destroyed());
        assert!(!backend.flat_probe().unwrap().is_attached());
        assert_eq!(controller.state(), ControllerState::Destroyed);
    }

    #[test]
    fn double_destroy_is_a_noop() {
        let (backend, mut controller) = mounted(false);
        let first = controller.destroy();
        assert!(!first.was_noop());
        backend.clear_calls();

        let second = controller.destroy();
        assert!(second.was_noop());
        assert!(second.is_clean());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn unsubscribe_stops_listener_and_is_not_repeated_on_teardown() {
        let (backend, mut controller) = mounted(false);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let key = controller
            .subscribe_resolution(Box::new(move |z: f64| sink.borrow_mut().push(z)))
            .unwrap();

        let flat = backend.flat_probe().unwrap();
        flat.user_zoom(3.0);
        assert!(controller.unsubscribe(key));
        assert!(!controller.unsubscribe(key));
        flat.user_zoom(4.0);

        assert_eq!(*seen.borrow(), vec![3.0]);
        assert_eq!(controller.destroy().listeners_detached, 0);
    }
}
