//! Contracts for the two rendering engines.
//!
//! The flat engine owns the render surface and the 2D view. The globe engine is
//! layered over a flat engine and can be enabled or disabled at runtime.
//! Adapters translate their platform's failures into [`EngineFault`] and must
//! never panic across these calls.

use foundation::math::{FlatCoord, GlobeCoord};

use crate::error::EngineFault;
use crate::style::{CircleStyle, PointStyle};

/// Identifier of the surface the flat engine draws into (a DOM element id on
/// the web).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTarget(pub String);

impl RenderTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlatView {
    pub center: FlatCoord,
    pub zoom: f64,
}

/// Animated move of the flat view.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlatAnimation {
    pub center: FlatCoord,
    pub zoom: f64,
    pub duration_ms: u32,
}

/// Camera flight of the globe.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlobeFlight {
    pub destination: GlobeCoord,
    pub duration_s: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlatMarker {
    pub position: FlatCoord,
    pub style: CircleStyle,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointMarker {
    pub position: GlobeCoord,
    pub style: PointStyle,
}

/// Handle returned by [`FlatEngine::on_resolution_change`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(pub u64);

/// Called with the new zoom level whenever the flat view's resolution changes.
pub type ResolutionListener = Box<dyn FnMut(f64)>;

pub trait FlatEngine {
    fn center(&self) -> FlatCoord;
    fn zoom(&self) -> f64;
    fn set_center(&mut self, center: FlatCoord);
    fn set_zoom(&mut self, zoom: f64);
    /// Starts an animated move; a newer call retargets a running one.
    fn animate(&mut self, animation: FlatAnimation);

    fn on_resolution_change(&mut self, listener: ResolutionListener) -> ListenerKey;
    /// Returns false when the key was unknown or already removed.
    fn remove_listener(&mut self, key: ListenerKey) -> bool;

    /// Replaces the single feature of the location layer; `None` empties it.
    fn set_location_feature(&mut self, marker: Option<FlatMarker>);

    /// Releases the render surface. Called exactly once, last.
    fn detach_target(&mut self) -> Result<(), EngineFault>;
}

pub trait GlobeEngine {
    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool) -> Result<(), EngineFault>;
    fn fly_to(&mut self, flight: GlobeFlight);
    /// Replaces the single point primitive; `None` removes it.
    fn set_point_marker(&mut self, marker: Option<PointMarker>);
    /// Releases GPU and scene resources. Called at most once.
    fn destroy(&mut self) -> Result<(), EngineFault>;
}

/// Factory for an engine pair.
///
/// `create_globe` must return a disabled globe bound to the given flat engine.
pub trait EngineBackend {
    type Flat: FlatEngine + 'static;
    type Globe: GlobeEngine + 'static;

    fn create_flat(&mut self, target: &RenderTarget, view: FlatView)
    -> Result<Self::Flat, EngineFault>;
    fn create_globe(&mut self, flat: &Self::Flat) -> Result<Self::Globe, EngineFault>;
}

/// The live engine pair. Owned by exactly one controller.
#[derive(Debug)]
pub struct EngineSet<F, G> {
    flat: F,
    globe: G,
}

impl<F: FlatEngine, G: GlobeEngine> EngineSet<F, G> {
    pub(crate) fn new(flat: F, globe: G) -> Self {
        Self { flat, globe }
    }

    pub fn flat(&self) -> &F {
        &self.flat
    }

    pub fn globe(&self) -> &G {
        &self.globe
    }

    pub(crate) fn flat_mut(&mut self) -> &mut F {
        &mut self.flat
    }

    pub(crate) fn globe_mut(&mut self) -> &mut G {
        &mut self.globe
    }

    pub fn globe_enabled(&self) -> bool {
        self.globe.enabled()
    }

    pub(crate) fn into_parts(self) -> (F, G) {
        (self.flat, self.globe)
    }
}
