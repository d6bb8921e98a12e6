use std::cell::RefCell;
use std::rc::Rc;

use foundation::math::FlatCoord;

use super::CallLog;
use crate::engine::{
    FlatAnimation, FlatEngine, FlatMarker, FlatView, ListenerKey, RenderTarget,
    ResolutionListener,
};
use crate::error::EngineFault;

struct Tween {
    from_center: FlatCoord,
    from_zoom: f64,
    to: FlatAnimation,
    elapsed_ms: f64,
}

struct FlatState {
    target: Option<RenderTarget>,
    center: FlatCoord,
    zoom: f64,
    tween: Option<Tween>,
    animations: Vec<FlatAnimation>,
    listeners: Vec<(ListenerKey, ResolutionListener)>,
    next_key: u64,
    feature: Option<FlatMarker>,
    feature_writes: usize,
    detach_fault: Option<String>,
    calls: CallLog,
}

/// Flat engine handle owned by a controller.
pub struct SimFlat {
    state: Rc<RefCell<FlatState>>,
}

/// Shared view of a [`SimFlat`] for inspection and frame stepping.
#[derive(Clone)]
pub struct SimFlatProbe {
    state: Rc<RefCell<FlatState>>,
}

impl SimFlat {
    pub(super) fn new(target: RenderTarget, view: FlatView, calls: CallLog) -> (Self, SimFlatProbe) {
        let state = Rc::new(RefCell::new(FlatState {
            target: Some(target),
            center: view.center,
            zoom: view.zoom,
            tween: None,
            animations: Vec::new(),
            listeners: Vec::new(),
            next_key: 0,
            feature: None,
            feature_writes: 0,
            detach_fault: None,
            calls,
        }));
        let probe = SimFlatProbe {
            state: Rc::clone(&state),
        };
        (Self { state }, probe)
    }

    pub fn target(&self) -> Option<RenderTarget> {
        self.state.borrow().target.clone()
    }

    fn log(&self, call: &str) {
        let calls = Rc::clone(&self.state.borrow().calls);
        calls.borrow_mut().push(call.to_string());
    }
}

impl FlatEngine for SimFlat {
    fn center(&self) -> FlatCoord {
        self.state.borrow().center
    }

    fn zoom(&self) -> f64 {
        self.state.borrow().zoom
    }

    fn set_center(&mut self, center: FlatCoord) {
        let mut st = self.state.borrow_mut();
        st.tween = None;
        st.center = center;
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.state.borrow_mut().tween = None;
        apply_zoom(&self.state, zoom);
    }

    fn animate(&mut self, animation: FlatAnimation) {
        {
            let mut st = self.state.borrow_mut();
            st.animations.push(animation);
            if animation.duration_ms > 0 {
                let (from_center, from_zoom) = (st.center, st.zoom);
                st.tween = Some(Tween {
                    from_center,
                    from_zoom,
                    to: animation,
                    elapsed_ms: 0.0,
                });
                return;
            }
            st.tween = None;
            st.center = animation.center;
        }
        apply_zoom(&self.state, animation.zoom);
    }

    fn on_resolution_change(&mut self, listener: ResolutionListener) -> ListenerKey {
        self.log("flat.on_resolution_change");
        let mut st = self.state.borrow_mut();
        let key = ListenerKey(st.next_key);
        st.next_key += 1;
        st.listeners.push((key, listener));
        key
    }

    fn remove_listener(&mut self, key: ListenerKey) -> bool {
        self.log("flat.remove_listener");
        let mut st = self.state.borrow_mut();
        let before = st.listeners.len();
        st.listeners.retain(|(k, _)| *k != key);
        st.listeners.len() != before
    }

    fn set_location_feature(&mut self, marker: Option<FlatMarker>) {
        let mut st = self.state.borrow_mut();
        st.feature = marker;
        st.feature_writes += 1;
    }

    fn detach_target(&mut self) -> Result<(), EngineFault> {
        self.log("flat.detach_target");
        let mut st = self.state.borrow_mut();
        if let Some(message) = &st.detach_fault {
            return Err(EngineFault::new(message.clone()));
        }
        match st.target.take() {
            Some(_) => Ok(()),
            None => Err(EngineFault::new("flat view already detached")),
        }
    }
}

impl SimFlatProbe {
    pub fn view(&self) -> FlatView {
        let st = self.state.borrow();
        FlatView {
            center: st.center,
            zoom: st.zoom,
        }
    }

    pub fn target(&self) -> Option<RenderTarget> {
        self.state.borrow().target.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.state.borrow().target.is_some()
    }

    /// Every animation requested so far, oldest first.
    pub fn animations(&self) -> Vec<FlatAnimation> {
        self.state.borrow().animations.clone()
    }

    pub fn is_animating(&self) -> bool {
        self.state.borrow().tween.is_some()
    }

    pub fn location_feature(&self) -> Option<FlatMarker> {
        self.state.borrow().feature
    }

    pub fn feature_writes(&self) -> usize {
        self.state.borrow().feature_writes
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn fail_detach(&self, message: impl Into<String>) {
        self.state.borrow_mut().detach_fault = Some(message.into());
    }

    /// Zoom changed by the user (wheel, pinch). Cancels a running animation.
    pub fn user_zoom(&self, zoom: f64) {
        self.state.borrow_mut().tween = None;
        apply_zoom(&self.state, zoom);
    }

    pub fn advance(&self, dt_s: f64) {
        let zoom = {
            let mut st = self.state.borrow_mut();
            let Some(tween) = st.tween.as_mut() else {
                return;
            };
            tween.elapsed_ms += dt_s * 1000.0;
            let t = (tween.elapsed_ms / f64::from(tween.to.duration_ms)).min(1.0);

            let (center, zoom) = if t >= 1.0 {
                (tween.to.center, tween.to.zoom)
            } else {
                let k = ease_in_out(t);
                (
                    FlatCoord::new(
                        lerp(tween.from_center.x_m, tween.to.center.x_m, k),
                        lerp(tween.from_center.y_m, tween.to.center.y_m, k),
                    ),
                    lerp(tween.from_zoom, tween.to.zoom, k),
                )
            };
            if t >= 1.0 {
                st.tween = None;
            }
            st.center = center;
            zoom
        };
        apply_zoom(&self.state, zoom);
    }
}

/// Sets the zoom and notifies listeners when it changed. Listeners run with
/// the state unborrowed.
fn apply_zoom(state: &Rc<RefCell<FlatState>>, zoom: f64) {
    let mut listeners = {
        let mut st = state.borrow_mut();
        if st.zoom == zoom {
            return;
        }
        st.zoom = zoom;
        std::mem::take(&mut st.listeners)
    };

    for (_, listener) in listeners.iter_mut() {
        listener(zoom);
    }

    let mut st = state.borrow_mut();
    listeners.append(&mut st.listeners);
    st.listeners = listeners;
}

fn ease_in_out(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f64, b: f64, k: f64) -> f64 {
    a + (b - a) * k
}
