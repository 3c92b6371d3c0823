pub type FramecastResult<T> = Result<T, FramecastError>;

#[derive(thiserror::Error, Debug)]
pub enum FramecastError {
    /// Bad export request or missing encoder binary. Rejected before any
    /// session resource is acquired, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The frame source failed for one frame. Rendering is assumed
    /// deterministic, so the session is aborted rather than retried.
    #[error("render error at frame {frame} (t={time}s): {msg}")]
    Render { frame: u64, time: f64, msg: String },

    /// The encoder closed its end of the stream (or the write failed).
    /// Frame production stops immediately.
    #[error("encoder pipe error: {0}")]
    EncoderPipe(String),

    /// The encoder subprocess terminated with a non-zero status. `stderr`
    /// holds its diagnostic output, captured but not interpreted.
    #[error("encoder exited with {status}: {stderr}")]
    EncodeFailed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramecastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(frame: u64, time: f64, msg: impl Into<String>) -> Self {
        Self::Render {
            frame,
            time,
            msg: msg.into(),
        }
    }

    pub fn encoder_pipe(msg: impl Into<String>) -> Self {
        Self::EncoderPipe(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            FramecastError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            FramecastError::render(3, 0.5, "x")
                .to_string()
                .contains("render error at frame 3")
        );
        assert!(
            FramecastError::encoder_pipe("x")
                .to_string()
                .contains("encoder pipe error:")
        );
    }

    #[test]
    fn render_error_carries_frame_and_time() {
        let err = FramecastError::render(7, 0.25, "backend lost");
        let FramecastError::Render { frame, time, .. } = err else {
            panic!("expected Render variant");
        };
        assert_eq!(frame, 7);
        assert_eq!(time, 0.25);
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = FramecastError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
