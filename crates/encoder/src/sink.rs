use std::time::Duration;

use image::RgbaImage;
use jobconfig::{EncodeJob, VideoCodec};

use crate::EncodeError;

/// Parameters an encoder is configured with before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
    pub bitrate: u64,
}

impl From<&EncodeJob> for EncoderConfig {
    fn from(job: &EncodeJob) -> Self {
        Self {
            codec: job.codec(),
            width: job.width(),
            height: job.height(),
            framerate: job.framerate(),
            bitrate: job.bitrate(),
        }
    }
}

/// A captured still tagged with its position on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub index: u64,
    pub timestamp: Duration,
    pub duration: Duration,
    pub image: RgbaImage,
}

impl VideoFrame {
    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A piece of encoded bitstream emitted by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub sequence: u64,
    pub data: Vec<u8>,
}

type OutputCallback = Box<dyn FnMut(EncodedChunk)>;
type ErrorCallback = Box<dyn FnMut(&EncodeError)>;

/// Output and error callbacks of a sink.
///
/// Callbacks always run on the thread that calls into the sink. The default
/// error callback logs; the default output callback drops the chunk.
pub struct SinkCallbacks {
    output: OutputCallback,
    error: ErrorCallback,
}

impl SinkCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_output(mut self, callback: impl FnMut(EncodedChunk) + 'static) -> Self {
        self.output = Box::new(callback);
        self
    }

    pub fn on_error(mut self, callback: impl FnMut(&EncodeError) + 'static) -> Self {
        self.error = Box::new(callback);
        self
    }

    pub(crate) fn output(&mut self, chunk: EncodedChunk) {
        (self.output)(chunk);
    }

    pub(crate) fn error(&mut self, err: &EncodeError) {
        (self.error)(err);
    }
}

impl Default for SinkCallbacks {
    fn default() -> Self {
        Self {
            output: Box::new(|chunk| {
                tracing::debug!(
                    sequence = chunk.sequence,
                    bytes = chunk.data.len(),
                    "dropping encoded chunk"
                );
            }),
            error: Box::new(|err| tracing::error!("{err}")),
        }
    }
}

impl std::fmt::Debug for SinkCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkCallbacks").finish_non_exhaustive()
    }
}

/// Consumer of captured frames.
///
/// Call order: `configure` once, `encode` with strictly increasing frame
/// indices, then `flush` and `close`. `abort` discards unflushed work and is
/// used when the producer fails part way.
pub trait EncoderSink {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncodeError>;
    fn encode(&mut self, frame: VideoFrame) -> Result<(), EncodeError>;
    /// Completes once every submitted frame has been emitted.
    fn flush(&mut self) -> Result<(), EncodeError>;
    fn close(&mut self) -> Result<(), EncodeError>;
    fn abort(&mut self) {}
}

impl<K: EncoderSink + ?Sized> EncoderSink for &mut K {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncodeError> {
        (**self).configure(config)
    }

    fn encode(&mut self, frame: VideoFrame) -> Result<(), EncodeError> {
        (**self).encode(frame)
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), EncodeError> {
        (**self).close()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

impl<K: EncoderSink + ?Sized> EncoderSink for Box<K> {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncodeError> {
        (**self).configure(config)
    }

    fn encode(&mut self, frame: VideoFrame) -> Result<(), EncodeError> {
        (**self).encode(frame)
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), EncodeError> {
        (**self).close()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

/// Enforces frame size and ordering for a configured stream.
#[derive(Debug, Clone)]
pub(crate) struct FrameCheck {
    size: (u32, u32),
    last: Option<u64>,
}

impl FrameCheck {
    pub(crate) fn new(config: &EncoderConfig) -> Self {
        Self {
            size: (config.width, config.height),
            last: None,
        }
    }

    pub(crate) fn accept(&mut self, frame: &VideoFrame) -> Result<(), EncodeError> {
        if let Some(last) = self.last {
            if frame.index <= last {
                return Err(EncodeError::OutOfOrder {
                    index: frame.index,
                    last,
                });
            }
        }
        if frame.size() != self.size {
            return Err(EncodeError::FrameSize {
                index: frame.index,
                expected: self.size,
                actual: frame.size(),
            });
        }
        self.last = Some(frame.index);
        Ok(())
    }
}

/// Calls observed by an [`InMemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Configure(EncoderConfig),
    Encode {
        index: u64,
        timestamp: Duration,
        duration: Duration,
    },
    Flush,
    Close,
    Abort,
}

/// Sink that keeps every frame in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    calls: Vec<SinkCall>,
    frames: Vec<VideoFrame>,
    check: Option<FrameCheck>,
    closed: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    pub fn frames(&self) -> &[VideoFrame] {
        &self.frames
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        self.calls.iter().find_map(|call| match call {
            SinkCall::Configure(config) => Some(config),
            _ => None,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl EncoderSink for InMemorySink {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncodeError> {
        if self.closed {
            return Err(EncodeError::Closed);
        }
        if self.check.is_some() {
            return Err(EncodeError::AlreadyConfigured);
        }
        self.check = Some(FrameCheck::new(config));
        self.calls.push(SinkCall::Configure(config.clone()));
        Ok(())
    }

    fn encode(&mut self, frame: VideoFrame) -> Result<(), EncodeError> {
        if self.closed {
            return Err(EncodeError::Closed);
        }
        let check = self.check.as_mut().ok_or(EncodeError::NotRunning)?;
        check.accept(&frame)?;
        self.calls.push(SinkCall::Encode {
            index: frame.index,
            timestamp: frame.timestamp,
            duration: frame.duration,
        });
        self.frames.push(frame);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        if self.closed {
            return Err(EncodeError::Closed);
        }
        if self.check.is_none() {
            return Err(EncodeError::NotRunning);
        }
        self.calls.push(SinkCall::Flush);
        Ok(())
    }

    fn close(&mut self) -> Result<(), EncodeError> {
        if self.closed {
            return Err(EncodeError::Closed);
        }
        self.closed = true;
        self.check = None;
        self.calls.push(SinkCall::Close);
        Ok(())
    }

    fn abort(&mut self) {
        self.calls.push(SinkCall::Abort);
    }
}
