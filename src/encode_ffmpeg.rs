//! Encoder process supervisor: builds the ffmpeg invocation for an export
//! request, launches the subprocess with its input connected to a pipe, and
//! finalizes it.

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::{Child, Command, Stdio},
    sync::OnceLock,
};

use crate::{
    error::{FramecastError, FramecastResult},
    export::ExportRequest,
    sink::PipeSink,
};

/// Default encoder binary, resolved through `PATH`.
pub const DEFAULT_ENCODER: &str = "ffmpeg";

/// Named bundle of container format, codec arguments, and target frame rate.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EncodeProfile {
    pub name: String,
    /// Container passed to `-f` (e.g. "mp4", "mov", "nut").
    pub container_format: String,
    /// Codec arguments inserted between the input spec and the output spec,
    /// in order.
    pub codec_args: Vec<String>,
    /// Input/output frame rate driving the export clock.
    pub fps: crate::clock::Fps,
}

impl EncodeProfile {
    /// The stock profile set.
    pub fn builtin() -> Vec<EncodeProfile> {
        let fps = crate::clock::Fps { num: 60, den: 1 };
        let profile = |name: &str, format: &str, args: &[&str]| EncodeProfile {
            name: name.to_string(),
            container_format: format.to_string(),
            codec_args: args.iter().map(|s| s.to_string()).collect(),
            fps,
        };
        vec![
            profile("MP4 / H264 4:2:0", "mp4", &["-pix_fmt", "yuv420p"]),
            profile("MP4 / H264 4:4:4", "mp4", &["-pix_fmt", "yuv444p"]),
            profile("MOV / QTRLE (Lossless)", "mov", &["-c:v", "qtrle"]),
            profile("NUT / FFV1 (Lossless)", "nut", &["-c:v", "ffv1"]),
        ]
    }

    /// Whether the profile targets 4:2:0 chroma subsampling, which requires
    /// even output dimensions.
    pub fn requires_even_dimensions(&self) -> bool {
        self.codec_args
            .windows(2)
            .any(|w| w[0] == "-pix_fmt" && w[1] == "yuv420p")
    }
}

/// Probe `program` for a working `-version` invocation.
pub fn probe_encoder(program: &OsStr) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Whether the default `ffmpeg` binary works. Probed once per process
/// lifetime, not per export.
pub fn ffmpeg_available() -> bool {
    static PROBE: OnceLock<bool> = OnceLock::new();
    *PROBE.get_or_init(|| probe_encoder(OsStr::new(DEFAULT_ENCODER)))
}

pub fn ensure_parent_dir(path: &Path) -> FramecastResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Encoder arguments for `request`: raw RGBA8 input at the profile's frame
/// rate on `pipe:0`, profile codec args, then the output container. The
/// output path is appended separately by [`EncoderProcess::spawn`] so
/// non-UTF-8 paths survive.
pub fn encoder_args(request: &ExportRequest) -> Vec<String> {
    let profile = &request.profile;
    let fps_arg = profile.fps.to_string();
    let size_arg = format!("{}x{}", request.width, request.height);
    let mut args: Vec<String> = [
        "-r",
        fps_arg.as_str(),
        "-v",
        "warning",
        "-nostats",
        "-nostdin",
        "-f",
        "rawvideo",
        "-video_size",
        size_arg.as_str(),
        "-pixel_format",
        "rgba",
        "-i",
        "pipe:0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend(profile.codec_args.iter().cloned());
    args.extend(["-f".to_string(), profile.container_format.clone()]);
    args.push("-y".to_string());
    args
}

/// A running encoder subprocess. Owns the child handle; the write end of its
/// input pipe lives in the [`PipeSink`] returned by [`EncoderProcess::spawn`].
pub struct EncoderProcess {
    child: Child,
    program: OsString,
}

impl EncoderProcess {
    /// Launch `program` for `request`, returning the supervisor handle and
    /// the stream's write end. Stderr is captured for diagnostics; stdout is
    /// discarded.
    pub fn spawn(program: &OsStr, request: &ExportRequest) -> FramecastResult<(Self, PipeSink)> {
        ensure_parent_dir(&request.output_path)?;

        let mut cmd = Command::new(program);
        cmd.args(encoder_args(request))
            .arg(&request.output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!(
            program = %program.to_string_lossy(),
            out = %request.output_path.display(),
            "spawning encoder"
        );

        let mut child = cmd.spawn().map_err(|e| {
            FramecastError::validation(format!(
                "failed to spawn encoder '{}': {e}",
                program.to_string_lossy()
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            FramecastError::encoder_pipe("failed to open encoder stdin (unexpected)")
        })?;

        Ok((
            Self {
                child,
                program: program.to_os_string(),
            },
            PipeSink::new(stdin),
        ))
    }

    /// Wait for the subprocess to terminate after end-of-stream. Success only
    /// if the exit code is 0; otherwise the captured stderr is surfaced.
    ///
    /// The stream's write end must already be closed, or this blocks forever.
    pub fn finish(self) -> FramecastResult<()> {
        let output = self.child.wait_with_output().map_err(|e| {
            FramecastError::encoder_pipe(format!("failed to wait for encoder exit: {e}"))
        })?;

        if !output.status.success() {
            return Err(FramecastError::EncodeFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    /// Wait for the subprocess and discard its outcome. Used on cancel and
    /// failure paths so no zombie survives; the (typically truncated) output
    /// file is left as-is.
    pub fn abort(self) {
        let program = self.program.to_string_lossy().into_owned();
        match self.child.wait_with_output() {
            Ok(output) if !output.status.success() => {
                tracing::debug!(
                    %program,
                    status = %output.status,
                    "encoder exited abnormally during abort (ignored)"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%program, "failed to reap encoder during abort: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request_64(profile: EncodeProfile) -> ExportRequest {
        ExportRequest::new(PathBuf::from("target/out.mp4"), 64, 64, profile).unwrap()
    }

    #[test]
    fn builtin_profiles_match_stock_set() {
        let profiles = EncodeProfile::builtin();
        assert_eq!(profiles.len(), 4);
        assert!(profiles[0].requires_even_dimensions());
        assert!(!profiles[1].requires_even_dimensions());
        assert!(!profiles[2].requires_even_dimensions());
        assert_eq!(profiles[3].container_format, "nut");
        for p in &profiles {
            assert_eq!(p.fps, crate::clock::Fps { num: 60, den: 1 });
        }
    }

    #[test]
    fn encoder_args_frame_the_raw_input() {
        let request = request_64(EncodeProfile::builtin().remove(0));
        let args = encoder_args(&request);

        let expect_pair = |flag: &str, value: &str| {
            let i = args.iter().position(|a| a == flag).unwrap();
            assert_eq!(args[i + 1], value, "value for {flag}");
        };
        expect_pair("-r", "60/1");
        expect_pair("-video_size", "64x64");
        expect_pair("-pixel_format", "rgba");
        expect_pair("-i", "pipe:0");
        expect_pair("-pix_fmt", "yuv420p");

        // Output spec comes last: `-f <container> -y` then the path.
        assert_eq!(args[args.len() - 3], "-f");
        assert_eq!(args[args.len() - 2], "mp4");
        assert_eq!(args[args.len() - 1], "-y");
    }

    #[test]
    fn encoder_args_respect_profile_container_and_codec() {
        let request = request_64(EncodeProfile::builtin().remove(3));
        let args = encoder_args(&request);
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "ffv1"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "nut"));
    }

    #[test]
    fn profile_round_trips_through_json() {
        let profile = EncodeProfile::builtin().remove(2);
        let json = serde_json::to_string(&profile).unwrap();
        let back: EncodeProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn probe_rejects_missing_binary() {
        assert!(!probe_encoder(OsStr::new(
            "/nonexistent/framecast-no-such-encoder"
        )));
    }
}
