//! Byte stream writer: moves raw frame buffers across the process boundary
//! into the encoder.

use std::io::Write as _;
use std::process::ChildStdin;

use crate::error::{FramecastError, FramecastResult};

/// Sink contract for consuming rendered frames in timeline order.
///
/// `write_frame` sends the whole buffer downstream, blocking while the
/// consumer is behind (backpressure). `close` signals end-of-stream and must
/// be called exactly once, after the last frame.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &[u8]) -> FramecastResult<()>;
    fn close(&mut self) -> FramecastResult<()>;
}

/// Write end of the encoder subprocess's input pipe.
///
/// Writes block once the kernel pipe buffer is full, which is the desired
/// backpressure: a frame is never produced faster than the encoder consumes
/// it. Dropping an unclosed sink still closes the descriptor.
pub struct PipeSink {
    stdin: Option<ChildStdin>,
}

impl PipeSink {
    pub(crate) fn new(stdin: ChildStdin) -> Self {
        Self { stdin: Some(stdin) }
    }
}

impl FrameSink for PipeSink {
    fn write_frame(&mut self, frame: &[u8]) -> FramecastResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(FramecastError::validation(
                "frame written after the stream was closed",
            ));
        };
        stdin.write_all(frame).map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                FramecastError::encoder_pipe("encoder closed its input pipe mid-stream")
            } else {
                FramecastError::encoder_pipe(format!("failed to write frame to encoder: {e}"))
            }
        })
    }

    fn close(&mut self) -> FramecastResult<()> {
        match self.stdin.take() {
            // Dropping the handle closes the descriptor and signals EOF.
            Some(stdin) => {
                drop(stdin);
                Ok(())
            }
            None => Err(FramecastError::validation("stream is already closed")),
        }
    }
}

/// In-memory sink for tests and debugging: counts frames and bytes, and can
/// simulate a crashed encoder by failing after a set number of frames.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub frames: u64,
    pub bytes: u64,
    pub closed: bool,
    pub fail_after: Option<u64>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(frames: u64) -> Self {
        Self {
            fail_after: Some(frames),
            ..Self::default()
        }
    }
}

impl FrameSink for CountingSink {
    fn write_frame(&mut self, frame: &[u8]) -> FramecastResult<()> {
        if self.closed {
            return Err(FramecastError::validation(
                "frame written after the stream was closed",
            ));
        }
        if let Some(limit) = self.fail_after
            && self.frames >= limit
        {
            return Err(FramecastError::encoder_pipe(
                "encoder closed its input pipe mid-stream",
            ));
        }
        self.frames += 1;
        self.bytes += frame.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> FramecastResult<()> {
        if self.closed {
            return Err(FramecastError::validation("stream is already closed"));
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_sink_accumulates() {
        let mut sink = CountingSink::new();
        sink.write_frame(&[0u8; 16]).unwrap();
        sink.write_frame(&[0u8; 16]).unwrap();
        assert_eq!(sink.frames, 2);
        assert_eq!(sink.bytes, 32);
    }

    #[test]
    fn counting_sink_close_is_exactly_once() {
        let mut sink = CountingSink::new();
        sink.close().unwrap();
        assert!(sink.close().is_err());
        assert!(sink.write_frame(&[0u8; 4]).is_err());
    }

    #[test]
    fn counting_sink_failure_injection_maps_to_pipe_error() {
        let mut sink = CountingSink::failing_after(1);
        sink.write_frame(&[0u8; 4]).unwrap();
        let err = sink.write_frame(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, FramecastError::EncoderPipe(_)));
        assert_eq!(sink.frames, 1);
    }
}
