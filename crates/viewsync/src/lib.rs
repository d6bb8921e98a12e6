//! Coordination layer for a map that is shown either as a flat 2D projection
//! or as a 3D globe layered over it.
//!
//! Rendering is delegated to two engines behind the traits in [`engine`]; this
//! crate owns their lifecycle, keeps the location marker consistent across
//! both, and turns a geolocation fix into synchronized camera moves.

pub mod camera;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod locate;
pub mod map_view;
pub mod marker;
pub mod readout;
pub mod sim;
pub mod style;

pub use camera::*;
pub use config::*;
pub use controller::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use locate::*;
pub use map_view::*;
pub use marker::*;
pub use readout::*;
pub use style::*;
