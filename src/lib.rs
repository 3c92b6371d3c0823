#![forbid(unsafe_code)]

pub mod clock;
pub mod encode_ffmpeg;
pub mod error;
pub mod export;
pub mod pattern;
pub mod sink;
pub mod source;

pub use clock::{Fps, frame_count, time_at};
pub use encode_ffmpeg::{
    DEFAULT_ENCODER, EncodeProfile, EncoderProcess, encoder_args, ffmpeg_available, probe_encoder,
};
pub use error::{FramecastError, FramecastResult};
pub use export::{
    CancelToken, ExportHandle, ExportObserver, ExportOutcome, ExportRequest, Exporter, NullObserver,
};
pub use pattern::PatternSource;
pub use sink::{CountingSink, FrameSink, PipeSink};
pub use source::{FrameSource, Surface, Viewport};
