use std::cell::RefCell;
use std::rc::Rc;

use foundation::math::GlobeCoord;

use super::CallLog;
use crate::engine::{GlobeEngine, GlobeFlight, PointMarker, RenderTarget};
use crate::error::EngineFault;

struct GlobeState {
    bound_to: RenderTarget,
    enabled: bool,
    destroyed: bool,
    camera: Option<GlobeCoord>,
    active: Option<(GlobeFlight, f64)>,
    flights: Vec<GlobeFlight>,
    marker: Option<PointMarker>,
    marker_writes: usize,
    disable_fault: Option<String>,
    destroy_fault: Option<String>,
    calls: CallLog,
}

pub struct SimGlobe {
    state: Rc<RefCell<GlobeState>>,
}

#[derive(Clone)]
pub struct SimGlobeProbe {
    state: Rc<RefCell<GlobeState>>,
}

impl SimGlobe {
    pub(super) fn new(bound_to: RenderTarget, calls: CallLog) -> (Self, SimGlobeProbe) {
        let state = Rc::new(RefCell::new(GlobeState {
            bound_to,
            enabled: false,
            destroyed: false,
            camera: None,
            active: None,
            flights: Vec::new(),
            marker: None,
            marker_writes: 0,
            disable_fault: None,
            destroy_fault: None,
            calls,
        }));
        let probe = SimGlobeProbe {
            state: Rc::clone(&state),
        };
        (Self { state }, probe)
    }

    fn log(&self, call: String) {
        let calls = Rc::clone(&self.state.borrow().calls);
        calls.borrow_mut().push(call);
    }
}

impl GlobeEngine for SimGlobe {
    fn enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), EngineFault> {
        self.log(format!("globe.set_enabled({enabled})"));
        let mut st = self.state.borrow_mut();
        if st.destroyed {
            return Err(EngineFault::new("globe already destroyed"));
        }
        if !enabled {
            if let Some(message) = &st.disable_fault {
                return Err(EngineFault::new(message.clone()));
            }
        }
        st.enabled = enabled;
        Ok(())
    }

    fn fly_to(&mut self, flight: GlobeFlight) {
        let mut st = self.state.borrow_mut();
        st.flights.push(flight);
        st.active = Some((flight, 0.0));
    }

    fn set_point_marker(&mut self, marker: Option<PointMarker>) {
        let mut st = self.state.borrow_mut();
        st.marker = marker;
        st.marker_writes += 1;
    }

    fn destroy(&mut self) -> Result<(), EngineFault> {
        self.log("globe.destroy".to_string());
        let mut st = self.state.borrow_mut();
        if st.destroyed {
            return Err(EngineFault::new("globe already destroyed"));
        }
        st.destroyed = true;
        st.enabled = false;
        st.active = None;
        match &st.destroy_fault {
            Some(message) => Err(EngineFault::new(message.clone())),
            None => Ok(()),
        }
    }
}

impl SimGlobeProbe {
    pub fn enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    pub fn bound_to(&self) -> RenderTarget {
        self.state.borrow().bound_to.clone()
    }

    /// Camera position after the last completed flight.
    pub fn camera(&self) -> Option<GlobeCoord> {
        self.state.borrow().camera
    }

    pub fn flights(&self) -> Vec<GlobeFlight> {
        self.state.borrow().flights.clone()
    }

    pub fn is_flying(&self) -> bool {
        self.state.borrow().active.is_some()
    }

    pub fn point_marker(&self) -> Option<PointMarker> {
        self.state.borrow().marker
    }

    pub fn marker_writes(&self) -> usize {
        self.state.borrow().marker_writes
    }

    /// Makes every `set_enabled(false)` fail, as a lost rendering context does.
    pub fn fail_disable(&self, message: impl Into<String>) {
        self.state.borrow_mut().disable_fault = Some(message.into());
    }

    pub fn fail_destroy(&self, message: impl Into<String>) {
        self.state.borrow_mut().destroy_fault = Some(message.into());
    }

    pub fn advance(&self, dt_s: f64) {
        let mut st = self.state.borrow_mut();
        let Some((flight, elapsed_s)) = st.active.as_mut() else {
            return;
        };
        *elapsed_s += dt_s;
        if *elapsed_s >= flight.duration_s {
            let destination = flight.destination;
            st.active = None;
            st.camera = Some(destination);
        }
    }
}
