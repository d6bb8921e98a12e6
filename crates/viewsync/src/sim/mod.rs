//! In-memory engines and geolocation for driving a view without a browser.
//!
//! Each engine handed to a controller has a cloneable probe sharing its state,
//! so callers can inspect what the controller did, advance animations by
//! fixed frames, and inject faults.

mod flat;
mod geolocation;
mod globe;

use std::cell::RefCell;
use std::rc::Rc;

pub use flat::{SimFlat, SimFlatProbe};
pub use geolocation::SimGeolocation;
pub use globe::{SimGlobe, SimGlobeProbe};

use crate::engine::{EngineBackend, FlatView, RenderTarget};
use crate::error::EngineFault;

/// Lifecycle calls in the order engines received them.
pub(crate) type CallLog = Rc<RefCell<Vec<String>>>;

#[derive(Default)]
pub struct SimBackend {
    calls: CallLog,
    flat: Option<SimFlatProbe>,
    globe: Option<SimGlobeProbe>,
    flat_fault: Option<String>,
    globe_fault: Option<String>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_flat_construction(&mut self, message: impl Into<String>) {
        self.flat_fault = Some(message.into());
    }

    pub fn fail_globe_construction(&mut self, message: impl Into<String>) {
        self.globe_fault = Some(message.into());
    }

    /// Probe of the most recently created flat engine.
    pub fn flat_probe(&self) -> Option<SimFlatProbe> {
        self.flat.clone()
    }

    pub fn globe_probe(&self) -> Option<SimGlobeProbe> {
        self.globe.clone()
    }

    /// Advances running animations on both engines by one frame.
    pub fn advance(&self, dt_s: f64) {
        if let Some(flat) = &self.flat {
            flat.advance(dt_s);
        }
        if let Some(globe) = &self.globe {
            globe.advance(dt_s);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl EngineBackend for SimBackend {
    type Flat = SimFlat;
    type Globe = SimGlobe;

    fn create_flat(
        &mut self,
        target: &RenderTarget,
        view: FlatView,
    ) -> Result<Self::Flat, EngineFault> {
        if let Some(message) = &self.flat_fault {
            return Err(EngineFault::new(message.clone()));
        }
        let (flat, probe) = SimFlat::new(target.clone(), view, Rc::clone(&self.calls));
        self.flat = Some(probe);
        Ok(flat)
    }

    fn create_globe(&mut self, flat: &Self::Flat) -> Result<Self::Globe, EngineFault> {
        if let Some(message) = &self.globe_fault {
            return Err(EngineFault::new(message.clone()));
        }
        let target = flat
            .target()
            .ok_or_else(|| EngineFault::new("flat view is not attached to a target"))?;
        let (globe, probe) = SimGlobe::new(target, Rc::clone(&self.calls));
        self.globe = Some(probe);
        Ok(globe)
    }
}
