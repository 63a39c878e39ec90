//! Frame capture and video encoding.
//!
//! [`run_encode`] drives a [`renderer::FrameTarget`] at fixed synthetic time
//! steps derived from an [`EncodeJob`], captures every frame and submits it to
//! an [`EncoderSink`] in strictly increasing order. [`FfmpegSink`] is the
//! production sink; [`InMemorySink`] records calls for inspection.

mod ffmpeg;
mod pipeline;
mod plan;
mod sink;

use playback::PlaybackError;

pub use ffmpeg::{ffmpeg_args, FfmpegSink};
pub use jobconfig::EncodeJob;
pub use pipeline::{encode_in_session, run_encode, EncodeSummary};
pub use plan::{FramePlan, FrameSchedule};
pub use sink::{
    EncodedChunk, EncoderConfig, EncoderSink, InMemorySink, SinkCall, SinkCallbacks, VideoFrame,
};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to resize render target: {reason:#}")]
    Resize { reason: anyhow::Error },
    #[error("failed to capture frame {index}: {reason:#}")]
    Capture { index: u64, reason: anyhow::Error },
    #[error("frame {index} is {actual:?}, encoder expects {expected:?}")]
    FrameSize {
        index: u64,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("frame {index} submitted out of order after frame {last}")]
    OutOfOrder { index: u64, last: u64 },
    #[error("frame {index} at {seconds}s does not fit the output timeline")]
    Timeline { index: u64, seconds: f64 },
    #[error("encoder configuration rejected: {0}")]
    Unsupported(String),
    #[error("encoder is already configured")]
    AlreadyConfigured,
    #[error("encoder is not accepting frames")]
    NotRunning,
    #[error("encoder is closed")]
    Closed,
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("encoder failed: {0}")]
    Encoder(String),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}
