use foundation::InvalidCoordinate;

use crate::controller::ControllerState;
use crate::locate::PositionError;

/// Failure reported by a rendering engine adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EngineFault(pub String);

impl EngineFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    /// Out-of-range geographic input. Never clamped.
    #[error(transparent)]
    InvalidCoordinate(#[from] InvalidCoordinate),

    #[error("geolocation is not supported on this platform")]
    CapabilityUnavailable,

    #[error("position unavailable: {0}")]
    PositionUnavailable(PositionError),

    /// Caught at the teardown boundary; reported, never propagated.
    #[error("engine teardown failed: {0}")]
    EngineTeardownFailure(EngineFault),

    #[error("engine construction failed: {0}")]
    EngineInit(EngineFault),

    #[error("engine call failed: {0}")]
    Engine(EngineFault),

    #[error("invalid view configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid camera target: {0}")]
    InvalidCameraTarget(String),

    #[error("cannot {action} while the view is {state:?}")]
    InvalidTransition {
        state: ControllerState,
        action: &'static str,
    },
}
