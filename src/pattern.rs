//! Built-in synthetic frame source: a deterministic animated gradient.
//!
//! Used by the CLI as a ready-made scene and by tests as a reproducible
//! source with no backend dependencies.

use crate::clock::Fps;
use crate::error::{FramecastError, FramecastResult};
use crate::source::{FrameSource, Surface};

/// Deterministic animated RGBA gradient. Pure function of `(x, y, time)`,
/// drawn inside the viewport with the letterbox cleared to opaque black.
#[derive(Clone, Debug)]
pub struct PatternSource {
    duration_secs: f64,
    fps: Fps,
    aspect: (u32, u32),
    surface: Option<Surface>,
}

impl PatternSource {
    pub fn new(duration_secs: f64, fps: Fps, aspect: (u32, u32)) -> Self {
        Self {
            duration_secs,
            fps,
            aspect,
            surface: None,
        }
    }
}

impl FrameSource for PatternSource {
    fn duration(&self) -> f64 {
        self.duration_secs
    }

    fn framerate(&self) -> Fps {
        self.fps
    }

    fn aspect_ratio(&self) -> (u32, u32) {
        self.aspect
    }

    fn acquire(&mut self, surface: &Surface) -> FramecastResult<()> {
        if self.surface.is_some() {
            return Err(FramecastError::validation(
                "pattern source context is already acquired",
            ));
        }
        self.surface = Some(*surface);
        Ok(())
    }

    fn render(&mut self, time: f64, frame: &mut [u8]) -> FramecastResult<()> {
        let surface = self.surface.ok_or_else(|| {
            FramecastError::validation("pattern source rendered without an acquired context")
        })?;
        if frame.len() != surface.frame_len() {
            return Err(FramecastError::validation(format!(
                "frame buffer is {} bytes, surface needs {}",
                frame.len(),
                surface.frame_len()
            )));
        }

        let phase = ((time * 255.0) as i64).rem_euclid(256) as u8;
        let vp = surface.viewport;
        let w = surface.width as usize;

        // Opaque black everywhere, then gradient inside the viewport.
        frame.fill(0);
        for px in frame.chunks_exact_mut(4) {
            px[3] = 255;
        }
        for y in 0..vp.height as usize {
            let row_start = (vp.y as usize + y) * w * 4;
            for x in 0..vp.width as usize {
                let i = row_start + (vp.x as usize + x) * 4;
                frame[i] = (x * 255 / vp.width.max(1) as usize) as u8;
                frame[i + 1] = (y * 255 / vp.height.max(1) as usize) as u8;
                frame[i + 2] = phase;
                frame[i + 3] = 255;
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        self.surface = None;
    }
}
