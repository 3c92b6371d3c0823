//! Export pipeline controller: drives the frame clock, pulls frames from a
//! [`FrameSource`], pushes them through the encoder stream, reports progress,
//! and honors cooperative cancellation.

use std::{
    ffi::{OsStr, OsString},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crate::{
    clock::{frame_count, time_at},
    encode_ffmpeg::{DEFAULT_ENCODER, EncodeProfile, EncoderProcess, ffmpeg_available, probe_encoder},
    error::{FramecastError, FramecastResult},
    sink::{FrameSink, PipeSink},
    source::{FrameSource, Surface, Viewport},
};

/// A validated export request.
///
/// `width` has its low bit cleared on construction (common 4:2:0 encoders
/// reject odd widths); `height` is additionally required to be even for
/// profiles targeting 4:2:0 output.
#[derive(Clone, Debug)]
pub struct ExportRequest {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub profile: EncodeProfile,
}

impl ExportRequest {
    pub fn new(
        output_path: impl Into<PathBuf>,
        width: u32,
        height: u32,
        profile: EncodeProfile,
    ) -> FramecastResult<Self> {
        if width == 0 || height == 0 {
            return Err(FramecastError::validation(
                "export width/height must be non-zero",
            ));
        }
        let width = width & !1;
        if width == 0 {
            return Err(FramecastError::validation(
                "export width must be at least 2",
            ));
        }
        if profile.requires_even_dimensions() && !height.is_multiple_of(2) {
            return Err(FramecastError::validation(format!(
                "profile '{}' targets 4:2:0 output and needs an even height, got {height}",
                profile.name
            )));
        }
        Ok(Self {
            output_path: output_path.into(),
            width,
            height,
            profile,
        })
    }

    /// Output surface for a scene with the given aspect ratio: full
    /// `width` x `height` with a centered aspect-fit viewport.
    pub fn surface_for(&self, aspect_ratio: (u32, u32)) -> FramecastResult<Surface> {
        if aspect_ratio.0 == 0 || aspect_ratio.1 == 0 {
            return Err(FramecastError::validation(
                "scene aspect ratio components must be non-zero",
            ));
        }
        Ok(Surface {
            width: self.width,
            height: self.height,
            viewport: Viewport::aspect_fit(self.width, self.height, aspect_ratio),
        })
    }
}

/// Receiver for progress and terminal events of one export.
///
/// Exactly one of `on_complete` / `on_cancelled` / `on_failed` fires per
/// export, and nothing follows it.
pub trait ExportObserver {
    /// Progress in `[0, 1]`, non-decreasing; final value before
    /// `on_complete` is `1.0`.
    fn on_progress(&mut self, _fraction: f64) {}
    fn on_complete(&mut self) {}
    fn on_cancelled(&mut self) {}
    fn on_failed(&mut self, _error: &FramecastError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default)]
pub struct NullObserver;

impl ExportObserver for NullObserver {}

/// Cooperative cancellation flag, checked once per frame boundary.
///
/// Single-writer/single-reader; relaxed ordering is sufficient since the
/// only requirement is eventual visibility.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal outcome of a non-failed export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    Completed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExportState {
    Rendering,
    Finalizing,
    Cancelling,
    Failed,
}

/// Releases the frame source's rendering context on every exit path.
struct SourceGuard<'a> {
    source: &'a mut dyn FrameSource,
}

impl Drop for SourceGuard<'_> {
    fn drop(&mut self) {
        self.source.release();
    }
}

/// The export pipeline controller.
///
/// One export at a time: the `&mut` borrow of the frame source for the whole
/// call is the session guard, no internal lock is held.
#[derive(Clone, Debug)]
pub struct Exporter {
    program: OsString,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    /// Exporter driving the system `ffmpeg` binary.
    pub fn new() -> Self {
        Self {
            program: OsString::from(DEFAULT_ENCODER),
        }
    }

    /// Exporter driving a custom encoder binary (test fakes, pinned builds).
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run one export session synchronously in the calling thread.
    ///
    /// Emits progress and exactly one terminal event on `observer`, mirrors
    /// the terminal event in the return value, and releases every session
    /// resource (pipe, subprocess, rendering context) on all paths.
    #[tracing::instrument(skip_all, fields(out = %request.output_path.display()))]
    pub fn export(
        &self,
        source: &mut dyn FrameSource,
        request: &ExportRequest,
        observer: &mut dyn ExportObserver,
        cancel: &CancelToken,
    ) -> FramecastResult<ExportOutcome> {
        match self.run(source, request, observer, cancel) {
            Ok(ExportOutcome::Completed) => {
                tracing::info!("export complete");
                observer.on_complete();
                Ok(ExportOutcome::Completed)
            }
            Ok(ExportOutcome::Cancelled) => {
                tracing::info!("export cancelled");
                observer.on_cancelled();
                Ok(ExportOutcome::Cancelled)
            }
            Err(err) => {
                tracing::debug!(state = ?ExportState::Failed, error = %err, "export failed");
                observer.on_failed(&err);
                Err(err)
            }
        }
    }

    fn run(
        &self,
        source: &mut dyn FrameSource,
        request: &ExportRequest,
        observer: &mut dyn ExportObserver,
        cancel: &CancelToken,
    ) -> FramecastResult<ExportOutcome> {
        self.check_encoder()?;

        let duration = source.duration();
        if duration <= 0.0 {
            return Err(FramecastError::validation(format!(
                "scene duration must be > 0, got {duration}"
            )));
        }

        let fps = request.profile.fps;
        let total = frame_count(duration, fps);
        let surface = request.surface_for(source.aspect_ratio())?;

        let (process, mut sink) = EncoderProcess::spawn(&self.program, request)?;

        if let Err(err) = source.acquire(&surface) {
            abort_session(sink, process);
            return Err(err);
        }
        let mut guard = SourceGuard { source };

        tracing::debug!(
            state = ?ExportState::Rendering,
            frames = total,
            width = surface.width,
            height = surface.height,
            %fps,
            "session started"
        );

        // Single frame buffer, overwritten each iteration.
        let mut frame = vec![0u8; surface.frame_len()];

        for index in 0..total {
            if cancel.is_cancelled() {
                tracing::debug!(state = ?ExportState::Cancelling, frame = index, "cancel requested");
                abort_session(sink, process);
                return Ok(ExportOutcome::Cancelled);
            }

            let time = time_at(index, fps);

            if let Err(err) = guard.source.render(time, &mut frame) {
                abort_session(sink, process);
                return Err(FramecastError::render(index, time, err.to_string()));
            }

            if let Err(err) = sink.write_frame(&frame) {
                // The encoder stopped reading; rendering more frames nobody
                // will consume is pointless.
                abort_session(sink, process);
                return Err(err);
            }

            let fraction = if total <= 1 {
                1.0
            } else {
                (index as f64 / (total - 1) as f64).clamp(0.0, 1.0)
            };
            observer.on_progress(fraction);
        }

        if total == 0 {
            // Trivial export: an empty stream is still a finished export.
            observer.on_progress(1.0);
        }

        tracing::debug!(state = ?ExportState::Finalizing, frames = total, "stream complete");

        if let Err(err) = sink.close() {
            process.abort();
            return Err(err);
        }
        process.finish()?;
        Ok(ExportOutcome::Completed)
    }

    fn check_encoder(&self) -> FramecastResult<()> {
        let available = if self.program == OsStr::new(DEFAULT_ENCODER) {
            ffmpeg_available()
        } else {
            probe_encoder(&self.program)
        };
        if !available {
            return Err(FramecastError::validation(format!(
                "no working encoder '{}' found, export is disabled",
                self.program.to_string_lossy()
            )));
        }
        Ok(())
    }

    /// Run the export on a dedicated worker thread so the caller stays
    /// responsive. Cancellation goes through the returned handle.
    pub fn spawn<S, O>(self, mut source: S, request: ExportRequest, mut observer: O) -> ExportHandle
    where
        S: FrameSource + Send + 'static,
        O: ExportObserver + Send + 'static,
    {
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let join = thread::spawn(move || {
            self.export(&mut source, &request, &mut observer, &worker_cancel)
        });
        ExportHandle { cancel, join }
    }
}

/// Close the stream and reap the subprocess, discarding outcomes. Shared
/// teardown for the cancel and failure paths.
fn abort_session(mut sink: PipeSink, process: EncoderProcess) {
    let _ = sink.close();
    process.abort();
}

/// Handle to an export running on a worker thread.
pub struct ExportHandle {
    cancel: CancelToken,
    join: thread::JoinHandle<FramecastResult<ExportOutcome>>,
}

impl ExportHandle {
    /// Request cooperative cancellation; takes effect at the next frame
    /// boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Block until the export finishes and return its outcome.
    pub fn wait(self) -> FramecastResult<ExportOutcome> {
        match self.join.join() {
            Ok(result) => result,
            Err(_) => Err(FramecastError::Other(anyhow::anyhow!(
                "export worker thread panicked"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_420() -> EncodeProfile {
        EncodeProfile::builtin().remove(0)
    }

    fn profile_ffv1() -> EncodeProfile {
        EncodeProfile::builtin().remove(3)
    }

    #[test]
    fn request_forces_width_even() {
        let req = ExportRequest::new("out.mp4", 65, 64, profile_420()).unwrap();
        assert_eq!(req.width, 64);

        let req = ExportRequest::new("out.mp4", 64, 64, profile_420()).unwrap();
        assert_eq!(req.width, 64);
    }

    #[test]
    fn request_rejects_degenerate_dimensions() {
        assert!(ExportRequest::new("out.mp4", 0, 64, profile_420()).is_err());
        assert!(ExportRequest::new("out.mp4", 64, 0, profile_420()).is_err());
        // Width 1 collapses to 0 once the low bit is cleared.
        assert!(ExportRequest::new("out.mp4", 1, 64, profile_420()).is_err());
    }

    #[test]
    fn odd_height_is_profile_dependent() {
        assert!(ExportRequest::new("out.mp4", 64, 63, profile_420()).is_err());
        assert!(ExportRequest::new("out.nut", 64, 63, profile_ffv1()).is_ok());
    }

    #[test]
    fn surface_for_rejects_zero_aspect() {
        let req = ExportRequest::new("out.mp4", 64, 64, profile_420()).unwrap();
        assert!(req.surface_for((0, 9)).is_err());
        assert!(req.surface_for((16, 0)).is_err());

        let surface = req.surface_for((16, 9)).unwrap();
        assert_eq!(surface.frame_len(), 64 * 64 * 4);
        assert_eq!(surface.viewport.width, 64);
    }

    #[test]
    fn cancel_token_is_sticky_and_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
