/// Earth-centered, Earth-fixed Cartesian coordinates (meters).
///
/// This is the native space of the globe engine: a globe camera destination
/// or point primitive position is an `Ecef` value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Position in the globe engine's coordinate space.
pub type GlobeCoord = Ecef;

impl Ecef {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distance from the Earth's center.
    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}
