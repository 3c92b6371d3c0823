//! Frame source contract: a stateful producer of fixed-size RGBA8 buffers
//! for arbitrary presentation times.

use crate::clock::Fps;
use crate::error::FramecastResult;

/// Region of the output surface the scene is drawn into, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Largest `aspect`-shaped rectangle that fits in `width` x `height`,
    /// centered. Integer math, width-first fit.
    pub fn aspect_fit(width: u32, height: u32, aspect: (u32, u32)) -> Self {
        let (aw, ah) = (u64::from(aspect.0), u64::from(aspect.1));
        let (w, h) = (u64::from(width), u64::from(height));

        let mut view_w = w;
        let mut view_h = w * ah / aw;
        if view_h > h {
            view_h = h;
            view_w = h * aw / ah;
        }

        Self {
            x: ((w - view_w) / 2) as u32,
            y: ((h - view_h) / 2) as u32,
            width: view_w as u32,
            height: view_h as u32,
        }
    }
}

/// Output surface handed to a [`FrameSource`] when its rendering context is
/// acquired for an export session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub viewport: Viewport,
}

impl Surface {
    /// Byte length of one RGBA8 frame for this surface.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A time-parameterized scene plus the capability to rasterize it.
///
/// Contract:
/// - `acquire` is called exactly once at session start and `release` exactly
///   once at session end, on every exit path (complete, cancel, fail).
/// - `render` fills the caller-owned buffer with exactly
///   `surface.frame_len()` RGBA8 bytes. The same buffer is reused across
///   frames; implementations must not retain references to it.
/// - `render` must be deterministic for a given (scene, time) pair so
///   exports are reproducible.
pub trait FrameSource {
    /// Scene duration in seconds. Must be > 0 for a valid scene.
    fn duration(&self) -> f64;

    /// The scene's native frame rate. Informational: the export clock runs
    /// at the encode profile's rate.
    fn framerate(&self) -> Fps;

    /// Display aspect ratio as `(w, h)`, both non-zero.
    fn aspect_ratio(&self) -> (u32, u32);

    /// Acquire the rendering context for `surface`.
    fn acquire(&mut self, surface: &Surface) -> FramecastResult<()>;

    /// Draw the scene at `time` into `frame` (RGBA8, `surface.frame_len()`
    /// bytes).
    fn render(&mut self, time: f64, frame: &mut [u8]) -> FramecastResult<()>;

    /// Release the rendering context. Must be safe to call after a failed
    /// `acquire` has never happened; only called once per successful acquire.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_fit_wide_scene_in_square_surface() {
        let vp = Viewport::aspect_fit(100, 100, (16, 9));
        assert_eq!(vp.width, 100);
        assert_eq!(vp.height, 56);
        assert_eq!(vp.x, 0);
        assert_eq!(vp.y, 22);
    }

    #[test]
    fn aspect_fit_tall_scene_in_wide_surface() {
        let vp = Viewport::aspect_fit(192, 108, (1, 1));
        assert_eq!(vp.width, 108);
        assert_eq!(vp.height, 108);
        assert_eq!(vp.x, 42);
        assert_eq!(vp.y, 0);
    }

    #[test]
    fn aspect_fit_exact_match_fills_surface() {
        let vp = Viewport::aspect_fit(1920, 1080, (16, 9));
        assert_eq!(
            vp,
            Viewport {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn frame_len_is_rgba8() {
        let surface = Surface {
            width: 64,
            height: 64,
            viewport: Viewport::aspect_fit(64, 64, (1, 1)),
        };
        assert_eq!(surface.frame_len(), 64 * 64 * 4);
    }
}
