//! Frame clock: pure mapping between frame indices and presentation times
//! under a fixed rational frame rate.

use crate::error::{FramecastError, FramecastResult};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> FramecastResult<Self> {
        if num == 0 {
            return Err(FramecastError::validation("Fps num must be > 0"));
        }
        if den == 0 {
            return Err(FramecastError::validation("Fps den must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Number of whole frames that fit in `duration_secs` at `fps`.
///
/// A duration shorter than one frame period yields 0, which is a valid
/// (trivial) export producing an empty stream.
pub fn frame_count(duration_secs: f64, fps: Fps) -> u64 {
    if duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs * f64::from(fps.num) / f64::from(fps.den)).floor() as u64
}

/// Presentation time in seconds of frame `index` at `fps`.
pub fn time_at(index: u64, fps: Fps) -> f64 {
    index as f64 * f64::from(fps.den) / f64::from(fps.num)
}
