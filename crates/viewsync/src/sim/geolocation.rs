use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::locate::{Fix, FixCallback, GeolocationProvider, PositionError, PositionErrorKind};

struct GeoState {
    available: bool,
    outcome: Result<Fix, PositionError>,
    deferred: bool,
    pending: VecDeque<(FixCallback, Result<Fix, PositionError>)>,
    requests: usize,
}

/// Scripted geolocation. Clones share state, so a test can keep one handle
/// after giving another to the view.
///
/// Requests complete immediately unless [`Self::set_deferred`] is on; then
/// they queue until resolved, which models a slow permission prompt.
#[derive(Clone)]
pub struct SimGeolocation {
    state: Rc<RefCell<GeoState>>,
}

impl SimGeolocation {
    fn with(available: bool, outcome: Result<Fix, PositionError>) -> Self {
        Self {
            state: Rc::new(RefCell::new(GeoState {
                available,
                outcome,
                deferred: false,
                pending: VecDeque::new(),
                requests: 0,
            })),
        }
    }

    pub fn granted(fix: Fix) -> Self {
        Self::with(true, Ok(fix))
    }

    pub fn denied() -> Self {
        Self::with(
            true,
            Err(PositionError::new(
                PositionErrorKind::PermissionDenied,
                "User denied Geolocation",
            )),
        )
    }

    /// A platform without geolocation at all.
    pub fn unsupported() -> Self {
        let mut sim = Self::denied();
        sim.set_available(false);
        sim
    }

    pub fn set_available(&mut self, available: bool) {
        self.state.borrow_mut().available = available;
    }

    pub fn set_outcome(&self, outcome: Result<Fix, PositionError>) {
        self.state.borrow_mut().outcome = outcome;
    }

    pub fn set_deferred(&self, deferred: bool) {
        self.state.borrow_mut().deferred = deferred;
    }

    pub fn request_count(&self) -> usize {
        self.state.borrow().requests
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Completes the oldest pending request. Returns false if none was queued.
    pub fn resolve_next(&self) -> bool {
        let next = self.state.borrow_mut().pending.pop_front();
        match next {
            Some((callback, outcome)) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }

    /// Completes the newest pending request first.
    pub fn resolve_latest(&self) -> bool {
        let next = self.state.borrow_mut().pending.pop_back();
        match next {
            Some((callback, outcome)) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }

    pub fn resolve_all(&self) -> usize {
        let mut resolved = 0;
        while self.resolve_next() {
            resolved += 1;
        }
        resolved
    }
}

impl GeolocationProvider for SimGeolocation {
    fn is_available(&self) -> bool {
        self.state.borrow().available
    }

    fn current_position(&mut self, on_complete: FixCallback) {
        let immediate = {
            let mut st = self.state.borrow_mut();
            st.requests += 1;
            let outcome = st.outcome.clone();
            if st.deferred {
                st.pending.push_back((on_complete, outcome));
                None
            } else {
                Some((on_complete, outcome))
            }
        };
        if let Some((callback, outcome)) = immediate {
            callback(outcome);
        }
    }
}
