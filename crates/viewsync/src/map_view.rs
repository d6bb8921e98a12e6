//! The mounted map: one controller, one marker store, one geolocation flow,
//! and an event bus the host listens on.
//!
//! Everything runs on the UI thread. Geolocation completions arrive as
//! callbacks that hold only a weak reference to the session, so a completion
//! after [`MapView::destroy`] (or after the view is dropped) is ignored.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use foundation::GeoPoint;
use foundation::math::{FlatCoord, from_engine_flat};
use runtime::{Event, EventBus};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::camera::{CameraSyncBridge, CameraTarget, Flights};
use crate::config::{ConfigError, ViewerConfig};
use crate::controller::{
    ControllerState, TeardownReport, ToggleButton, ViewMode, ViewModeController,
};
use crate::engine::{EngineBackend, FlatEngine, FlatView, RenderTarget};
use crate::error::ViewError;
use crate::events::{Notice, ViewEvent, ViewEventBus};
use crate::locate::{Fix, GeolocationFlow, GeolocationProvider, PositionError};
use crate::marker::LocationMarkerStore;
use crate::readout::{ZoomIndicator, format_pointer};

struct Session<B: EngineBackend> {
    controller: ViewModeController<B>,
    markers: LocationMarkerStore,
    bridge: CameraSyncBridge,
    flow: GeolocationFlow,
    zoom: Option<ZoomIndicator>,
}

/// Serializable summary of a view, for hosts and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub state: ControllerState,
    pub mode: Option<ViewMode>,
    /// Flat view center as `[lon, lat]` degrees.
    pub center: Option<[f64; 2]>,
    pub zoom: Option<f64>,
    pub globe_enabled: bool,
    pub location: Option<[f64; 2]>,
    pub marker_visible: bool,
    pub locate_requests: u64,
}

pub struct MapView<B: EngineBackend + 'static, P: GeolocationProvider> {
    session: Rc<RefCell<Session<B>>>,
    events: Rc<RefCell<ViewEventBus>>,
    geolocation: P,
    home: FlatView,
}

impl<B: EngineBackend + 'static, P: GeolocationProvider> std::fmt::Debug for MapView<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView")
            .field("state", &self.session.try_borrow().map(|s| s.controller.state()).ok())
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

impl<B: EngineBackend + 'static, P: GeolocationProvider> MapView<B, P> {
    /// Builds both engines on `target` and starts publishing the zoom readout.
    pub fn mount(
        backend: &mut B,
        geolocation: P,
        config: &ViewerConfig,
        target: &RenderTarget,
    ) -> Result<Self, ViewError> {
        config.validate().map_err(|err| match err {
            ConfigError::Invalid(msg) => ViewError::InvalidConfig(msg),
            other => ViewError::InvalidConfig(other.to_string()),
        })?;
        let bridge = CameraSyncBridge::new(config.flat_zoom)?;
        let home = config.initial_view.to_flat_view()?;
        let events: Rc<RefCell<ViewEventBus>> = Rc::new(RefCell::new(
            EventBus::with_max_buffered(config.event_buffer),
        ));

        let mut controller = ViewModeController::new();
        let mode = controller.mount(backend, target, home, config.start_in_globe)?;

        let sink = Rc::downgrade(&events);
        let zoom = match ZoomIndicator::attach(&mut controller, move |text| {
            emit_weak(&sink, ViewEvent::ZoomReadout(text));
        }) {
            Ok(zoom) => zoom,
            Err(err) => {
                controller.destroy();
                return Err(err);
            }
        };

        let session = Session {
            controller,
            markers: LocationMarkerStore::new(config.marker),
            bridge,
            flow: GeolocationFlow::new(config.locate),
            zoom: Some(zoom),
        };
        let view = Self {
            session: Rc::new(RefCell::new(session)),
            events,
            geolocation,
            home,
        };
        view.emit(ViewEvent::ModeChanged {
            mode,
            button: ToggleButton::for_mode(mode),
        });
        Ok(view)
    }

    pub fn state(&self) -> ControllerState {
        self.session.borrow().controller.state()
    }

    pub fn mode(&self) -> Option<ViewMode> {
        self.state().mode()
    }

    pub fn toggle_button(&self) -> Option<ToggleButton> {
        self.mode().map(ToggleButton::for_mode)
    }

    pub fn current_location(&self) -> Option<GeoPoint> {
        self.session.borrow().markers.current_location()
    }

    pub fn geolocation(&self) -> &P {
        &self.geolocation
    }

    /// Asks the platform for the user's position. Failures surface as a
    /// [`Notice`] event; there is nothing to return synchronously.
    pub fn locate_user(&mut self) {
        let state = self.state();
        if !state.is_live() {
            debug!(?state, "locate ignored: view is not mounted");
            return;
        }
        if !self.geolocation.is_available() {
            warn!("geolocation is not available on this platform");
            self.emit(ViewEvent::Notice(Notice::CapabilityUnavailable));
            return;
        }

        let request = self.session.borrow_mut().flow.begin();
        debug!(request, "requesting current position");
        let session = Rc::downgrade(&self.session);
        let events = Rc::downgrade(&self.events);
        self.geolocation
            .current_position(Box::new(move |result: Result<Fix, PositionError>| {
                complete_locate(&session, &events, request, result);
            }));
    }

    /// Flips between flat and globe. The marker is re-published so the globe
    /// shows it as soon as it is enabled.
    pub fn toggle(&mut self) -> Result<ViewMode, ViewError> {
        let mode = {
            let mut guard = self.session.borrow_mut();
            let Session {
                controller,
                markers,
                ..
            } = &mut *guard;
            let mode = controller.toggle()?;
            if let Some(engines) = controller.engines_mut() {
                markers.refresh(engines);
            }
            mode
        };
        info!(?mode, "view mode changed");
        self.emit(ViewEvent::ModeChanged {
            mode,
            button: ToggleButton::for_mode(mode),
        });
        Ok(mode)
    }

    /// Moves both cameras to `target`.
    pub fn fly_to(&mut self, target: &CameraTarget) -> Result<Flights, ViewError> {
        let mut guard = self.session.borrow_mut();
        let Session {
            controller, bridge, ..
        } = &mut *guard;
        let state = controller.state();
        let engines = controller
            .engines_mut()
            .ok_or(ViewError::InvalidTransition {
                state,
                action: "fly",
            })?;
        Ok(bridge.fly_to(engines, target))
    }

    /// Jumps the flat view back to its configured start.
    pub fn reset_view(&mut self) -> Result<(), ViewError> {
        let home = self.home;
        let mut guard = self.session.borrow_mut();
        let state = guard.controller.state();
        let engines = guard
            .controller
            .engines_mut()
            .ok_or(ViewError::InvalidTransition {
                state,
                action: "reset the view",
            })?;
        let flat = engines.flat_mut();
        flat.set_center(home.center);
        flat.set_zoom(home.zoom);
        Ok(())
    }

    pub fn clear_location(&mut self) -> Result<bool, ViewError> {
        let cleared = {
            let mut guard = self.session.borrow_mut();
            let Session {
                controller,
                markers,
                ..
            } = &mut *guard;
            let state = controller.state();
            let engines = controller
                .engines_mut()
                .ok_or(ViewError::InvalidTransition {
                    state,
                    action: "clear the location",
                })?;
            markers.clear(engines)
        };
        if cleared {
            self.emit(ViewEvent::MarkerCleared);
        }
        Ok(cleared)
    }

    pub fn set_marker_visible(&mut self, visible: bool) -> Result<bool, ViewError> {
        let mut guard = self.session.borrow_mut();
        let Session {
            controller,
            markers,
            ..
        } = &mut *guard;
        let state = controller.state();
        let engines = controller
            .engines_mut()
            .ok_or(ViewError::InvalidTransition {
                state,
                action: "change marker visibility",
            })?;
        Ok(markers.set_visible(engines, visible))
    }

    pub fn pointer_readout(&self, coord: FlatCoord) -> String {
        format_pointer(coord)
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let session = self.session.borrow();
        let engines = session.controller.engines();
        let center = engines
            .and_then(|e| from_engine_flat(e.flat().center()).ok())
            .map(|p| [p.lon_deg(), p.lat_deg()]);
        let marker = session.markers.marker();
        ViewSnapshot {
            state: session.controller.state(),
            mode: session.controller.mode(),
            center,
            zoom: engines.map(|e| e.flat().zoom()),
            globe_enabled: engines.is_some_and(|e| e.globe_enabled()),
            location: marker.map(|m| [m.position.lon_deg(), m.position.lat_deg()]),
            marker_visible: marker.is_some_and(|m| m.visible),
            locate_requests: session.flow.issued(),
        }
    }

    /// Registers a host callback for every future event. The callback must
    /// not call back into this view.
    pub fn observe(&self, observer: impl FnMut(&Event<ViewEvent>) + 'static) {
        self.events.borrow_mut().observe(observer);
    }

    /// Buffered events since the last drain, including those emitted during
    /// [`Self::mount`]. At most `event_buffer` of the newest are kept.
    pub fn drain_events(&self) -> Vec<Event<ViewEvent>> {
        self.events.borrow_mut().drain()
    }

    /// Tears down both engines. Safe to call more than once; only the first
    /// call does anything.
    pub fn destroy(&mut self) -> TeardownReport {
        let mut guard = self.session.borrow_mut();
        let Session {
            controller,
            markers,
            zoom,
            ..
        } = &mut *guard;
        // The controller detaches the indicator's listener with the others.
        zoom.take();
        markers.discard();
        controller.destroy()
    }

    fn emit(&self, event: ViewEvent) {
        self.events.borrow_mut().emit(event);
    }
}

impl<B: EngineBackend + 'static, P: GeolocationProvider> Drop for MapView<B, P> {
    fn drop(&mut self) {
        let live = self
            .session
            .try_borrow()
            .is_ok_and(|s| s.controller.state() != ControllerState::Destroyed);
        if live {
            let report = self.destroy();
            debug!(faults = report.faults.len(), "view destroyed on drop");
        }
    }
}

fn emit_weak(events: &Weak<RefCell<ViewEventBus>>, event: ViewEvent) {
    if let Some(bus) = events.upgrade() {
        bus.borrow_mut().emit(event);
    }
}

fn complete_locate<B: EngineBackend + 'static>(
    session: &Weak<RefCell<Session<B>>>,
    events: &Weak<RefCell<ViewEventBus>>,
    request: u64,
    result: Result<Fix, PositionError>,
) {
    let Some(session) = session.upgrade() else {
        debug!(request, "position fix dropped: view no longer exists");
        return;
    };
    let Ok(mut guard) = session.try_borrow_mut() else {
        warn!(request, "position fix dropped: view is busy");
        return;
    };
    let state = guard.controller.state();
    if !state.is_live() {
        debug!(request, ?state, "position fix dropped: view is torn down");
        return;
    }

    let Session {
        controller,
        markers,
        bridge,
        flow,
        ..
    } = &mut *guard;
    let outcome = flow.complete(request, controller, markers, bridge, result);
    drop(guard);

    let event = match outcome {
        Ok(located) => {
            info!(
                request,
                lon = located.position.lon_deg(),
                lat = located.position.lat_deg(),
                "user located"
            );
            ViewEvent::MarkerMoved {
                lon_deg: located.position.lon_deg(),
                lat_deg: located.position.lat_deg(),
            }
        }
        Err(err) => {
            match &err {
                ViewError::InvalidCoordinate(_) => {
                    error!(request, %err, "position fix out of range")
                }
                _ => warn!(request, %err, "unable to retrieve location"),
            }
            ViewEvent::Notice(Notice::for_error(&err).unwrap_or(Notice::PositionUnavailable))
        }
    };
    emit_weak(events, event);
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use foundation::math::{lon_lat_to_flat, to_engine_globe};
    use foundation::GeoPoint;
    use pretty_assertions::assert_eq;

    use super::{MapView, ViewSnapshot};
    use crate::camera::{CameraTarget, ZoomScale};
    use crate::config::ViewerConfig;
    use crate::controller::{ControllerState, ToggleButton, ViewMode};
    use crate::engine::RenderTarget;
    use crate::events::{Notice, ViewEvent};
    use crate::locate::{Fix, PositionError, PositionErrorKind};
    use crate::sim::{SimBackend, SimGeolocation};

    type SimView = MapView<SimBackend, SimGeolocation>;

    fn mount_with(geo: SimGeolocation, config: &ViewerConfig) -> (SimBackend, SimView) {
        let mut backend = SimBackend::new();
        let view = MapView::mount(&mut backend, geo, config, &RenderTarget::new("map")).unwrap();
        (backend, view)
    }

    fn mount(geo: SimGeolocation) -> (SimBackend, SimView) {
        mount_with(geo, &ViewerConfig::default())
    }

    fn payloads(view: &SimView) -> Vec<ViewEvent> {
        view.drain_events().into_iter().map(|e| e.payload).collect()
    }

    fn sf() -> Fix {
        Fix::new(-122.42, 37.77)
    }

    #[test]
    fn mount_publishes_zoom_and_button() {
        let (_backend, view) = mount(SimGeolocation::granted(sf()));
        assert_eq!(
            payloads(&view),
            vec![
                ViewEvent::ZoomReadout("Zoom: 2.00".into()),
                ViewEvent::ModeChanged {
                    mode: ViewMode::Flat,
                    button: ToggleButton::for_mode(ViewMode::Flat),
                },
            ]
        );
        assert_eq!(view.toggle_button().unwrap().text, "3D");
    }

    #[test]
    fn granted_fix_moves_marker_and_both_cameras() {
        let (backend, mut view) = mount(SimGeolocation::granted(sf()));
        view.toggle().unwrap();
        view.drain_events();

        view.locate_user();

        let expected = GeoPoint::new(-122.42, 37.77).unwrap();
        assert_eq!(view.current_location(), Some(expected));

        let flat = backend.flat_probe().unwrap();
        let anim = flat.animations()[0];
        assert_eq!(anim.center, lon_lat_to_flat(-122.42, 37.77).unwrap());
        assert_eq!(anim.zoom, 14.0);
        assert_eq!(anim.duration_ms, 2000);

        let globe = backend.globe_probe().unwrap();
        let flight = globe.flights()[0];
        assert_eq!(flight.duration_s, 2.0);
        assert_eq!(
            flight.destination,
            to_engine_globe(expected.with_altitude(1000.0).unwrap())
        );
        assert_eq!(
            globe.point_marker().unwrap().position,
            to_engine_globe(expected)
        );

        assert_eq!(
            payloads(&view),
            vec![ViewEvent::MarkerMoved {
                lon_deg: -122.42,
                lat_deg: 37.77
            }]
        );

        backend.advance(2.0);
        assert_eq!(flat.view().zoom, 14.0);
        assert_eq!(globe.camera(), Some(flight.destination));
    }

    #[test]
    fn denied_permission_notifies_and_leaves_state() {
        let (backend, mut view) = mount(SimGeolocation::denied());
        view.drain_events();

        view.locate_user();

        assert_eq!(view.current_location(), None);
        assert!(backend.flat_probe().unwrap().animations().is_empty());
        assert_eq!(
            payloads(&view),
            vec![ViewEvent::Notice(Notice::PositionUnavailable)]
        );
        assert_eq!(
            Notice::PositionUnavailable.message(),
            "Unable to retrieve your location"
        );
    }

    #[test]
    fn missing_capability_notifies_without_requesting() {
        let geo = SimGeolocation::unsupported();
        let (_backend, mut view) = mount(geo.clone());
        view.drain_events();

        view.locate_user();

        assert_eq!(geo.request_count(), 0);
        assert_eq!(
            payloads(&view),
            vec![ViewEvent::Notice(Notice::CapabilityUnavailable)]
        );
    }

    #[test]
    fn out_of_range_fix_is_rejected_not_clamped() {
        let (backend, mut view) = mount(SimGeolocation::granted(Fix::new(0.0, 120.0)));
        view.drain_events();
        view.locate_user();

        assert_eq!(view.current_location(), None);
        assert!(backend.flat_probe().unwrap().location_feature().is_none());
        assert_eq!(
            payloads(&view),
            vec![ViewEvent::Notice(Notice::PositionUnavailable)]
        );
    }

    #[test]
    fn fix_after_destroy_is_ignored() {
        let geo = SimGeolocation::granted(sf());
        geo.set_deferred(true);
        let (backend, mut view) = mount(geo.clone());

        view.locate_user();
        view.destroy();
        view.drain_events();

        assert!(geo.resolve_next());
        assert_eq!(view.current_location(), None);
        assert!(backend.flat_probe().unwrap().animations().is_empty());
        assert!(view.drain_events().is_empty());
    }

    #[test]
    fn fix_after_drop_is_ignored() {
        let geo = SimGeolocation::granted(sf());
        geo.set_deferred(true);
        let (backend, mut view) = mount(geo.clone());
        view.locate_user();
        drop(view);

        assert!(geo.resolve_next());
        assert!(backend.globe_probe().unwrap().is_destroyed());
        assert!(backend.flat_probe().unwrap().animations().is_empty());
    }

    #[test]
    fn overlapping_requests_last_completion_wins() {
        let geo = SimGeolocation::granted(Fix::new(10.0, 10.0));
        geo.set_deferred(true);
        let (_backend, mut view) = mount(geo.clone());

        view.locate_user();
        geo.set_outcome(Ok(Fix::new(20.0, 20.0)));
        view.locate_user();
        assert_eq!(geo.pending(), 2);

        // Newer request finishes first, the older one last.
        geo.resolve_latest();
        geo.resolve_latest();
        assert_eq!(view.current_location(), Some(GeoPoint::new(10.0, 10.0).unwrap()));
    }

    #[test]
    fn double_toggle_restores_button_and_refreshes_marker() {
        let (backend, mut view) = mount(SimGeolocation::granted(sf()));
        view.locate_user();

        assert_eq!(view.toggle().unwrap(), ViewMode::Globe);
        let globe = backend.globe_probe().unwrap();
        assert!(globe.point_marker().is_some(), "marker appears once the globe is on");
        assert_eq!(view.toggle_button().unwrap().title, "Switch to 2D");

        assert_eq!(view.toggle().unwrap(), ViewMode::Flat);
        assert_eq!(view.state(), ControllerState::FlatOnly);
        assert_eq!(view.toggle_button().unwrap().text, "3D");
        assert!(backend.flat_probe().unwrap().location_feature().is_some());
    }

    #[test]
    fn fly_to_with_globe_disabled_leaves_globe_alone() {
        let (backend, mut view) = mount(SimGeolocation::granted(sf()));
        let target =
            CameraTarget::new(GeoPoint::new(2.35, 48.85).unwrap(), 10.0, 5000.0, 500).unwrap();

        let flights = view.fly_to(&target).unwrap();
        assert!(flights.globe.is_none());

        let globe = backend.globe_probe().unwrap();
        assert!(globe.flights().is_empty());
        assert_eq!(globe.camera(), None);
        assert_eq!(backend.flat_probe().unwrap().animations().len(), 1);
    }

    #[test]
    fn zoom_change_is_published_once() {
        let (backend, view) = mount(SimGeolocation::granted(sf()));
        view.drain_events();

        backend.flat_probe().unwrap().user_zoom(5.37);
        assert_eq!(
            payloads(&view),
            vec![ViewEvent::ZoomReadout("Zoom: 5.37".into())]
        );
    }

    #[test]
    fn observed_zoom_stream_keeps_buffer_bounded() {
        let config = ViewerConfig {
            event_buffer: 8,
            ..ViewerConfig::default()
        };
        let (backend, view) = mount_with(SimGeolocation::granted(sf()), &config);
        let seen = Rc::new(Cell::new(0usize));
        let count = Rc::clone(&seen);
        view.observe(move |_| count.set(count.get() + 1));

        let flat = backend.flat_probe().unwrap();
        for step in 1..=1000 {
            flat.user_zoom(2.0 + f64::from(step) * 0.01);
        }
        assert_eq!(seen.get(), 1000);
        let kept = view.drain_events();
        assert_eq!(kept.len(), 8);
        assert_eq!(
            kept.last().map(|e| e.payload.clone()),
            Some(ViewEvent::ZoomReadout("Zoom: 12.00".into()))
        );
    }

    #[test]
    fn double_destroy_is_noop_and_stops_zoom_readout() {
        let (backend, mut view) = mount(SimGeolocation::granted(sf()));
        let first = view.destroy();
        assert!(first.is_clean());
        assert_eq!(first.listeners_detached, 1);

        let second = view.destroy();
        assert!(second.was_noop());
        assert_eq!(view.state(), ControllerState::Destroyed);
        assert_eq!(backend.flat_probe().unwrap().listener_count(), 0);
        assert!(view.toggle().is_err());
    }

    #[test]
    fn teardown_survives_globe_fault() {
        let (backend, mut view) = mount_with(
            SimGeolocation::granted(sf()),
            &ViewerConfig {
                start_in_globe: true,
                ..ViewerConfig::default()
            },
        );
        backend.globe_probe().unwrap().fail_disable("context lost");

        let report = view.destroy();
        assert_eq!(report.faults.len(), 1);
        assert!(!backend.flat_probe().unwrap().is_attached());
    }

    #[test]
    fn reset_and_clear() {
        let (backend, mut view) = mount(SimGeolocation::granted(sf()));
        view.locate_user();
        backend.advance(2.0);

        view.reset_view().unwrap();
        assert_eq!(backend.flat_probe().unwrap().view().zoom, 2.0);
        assert_eq!(view.clear_location().unwrap(), true);
        assert_eq!(view.clear_location().unwrap(), false);
        assert_eq!(view.current_location(), None);
    }

    #[test]
    fn snapshot_reports_state() {
        let (_backend, mut view) = mount(SimGeolocation::granted(sf()));
        view.locate_user();
        let snap = view.snapshot();
        assert_eq!(
            snap,
            ViewSnapshot {
                state: ControllerState::FlatOnly,
                mode: Some(ViewMode::Flat),
                center: Some([0.0, 0.0]),
                zoom: Some(2.0),
                globe_enabled: false,
                location: Some([-122.42, 37.77]),
                marker_visible: true,
                locate_requests: 1,
            }
        );
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["state"], "flat_only");
    }

    #[test]
    fn invalid_initial_view_fails_mount() {
        let mut backend = SimBackend::new();
        let mut config = ViewerConfig::default();
        config.initial_view.center_lon_deg = 400.0;
        let err = MapView::mount(
            &mut backend,
            SimGeolocation::denied(),
            &config,
            &RenderTarget::new("map"),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::ViewError::InvalidConfig(_)));
        assert!(backend.flat_probe().is_none());
    }

    #[test]
    fn inverted_zoom_scale_fails_mount_instead_of_locate() {
        let mut backend = SimBackend::new();
        let config = ViewerConfig {
            flat_zoom: ZoomScale {
                min_zoom: 20.0,
                max_zoom: 1.0,
            },
            ..ViewerConfig::default()
        };
        let err = MapView::mount(
            &mut backend,
            SimGeolocation::granted(sf()),
            &config,
            &RenderTarget::new("map"),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::ViewError::InvalidConfig(_)), "{err}");
        assert!(backend.flat_probe().is_none());
    }

    #[test]
    fn position_error_kinds_all_notify() {
        for kind in [PositionErrorKind::Timeout, PositionErrorKind::PositionUnavailable] {
            let geo = SimGeolocation::granted(sf());
            geo.set_outcome(Err(PositionError::new(kind, "no fix")));
            let (_backend, mut view) = mount(geo);
            view.drain_events();
            view.locate_user();
            assert_eq!(
                payloads(&view),
                vec![ViewEvent::Notice(Notice::PositionUnavailable)]
            );
        }
    }
}
