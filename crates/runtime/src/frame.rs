/// Deterministic frame metadata for the UI event loop.
///
/// Engine-driven work (camera animations in particular) advances by whole
/// frames of fixed length, so a session can be replayed exactly.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Fixed delta time (seconds).
    pub dt_s: f64,
}

impl Frame {
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self { index, dt_s }
    }

    pub fn first(dt_s: f64) -> Self {
        Self::new(0, dt_s)
    }

    /// Loop time at the start of this frame.
    pub fn elapsed_s(&self) -> f64 {
        self.index as f64 * self.dt_s
    }

    /// The next `count` frames, starting with this one.
    pub fn run(self, count: u64) -> impl Iterator<Item = Frame> {
        (0..count).map(move |i| Frame::new(self.index + i, self.dt_s))
    }

    /// Frames needed to cover `duration_ms`, rounded up.
    pub fn count_for_ms(dt_s: f64, duration_ms: u32) -> u64 {
        if dt_s <= 0.0 {
            return 0;
        }
        (f64::from(duration_ms) / (dt_s * 1000.0)).ceil() as u64
    }
}
