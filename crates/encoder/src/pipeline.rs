use std::time::{Duration, Instant};

use jobconfig::EncodeJob;
use playback::Session;
use renderer::{FrameTarget, TimeSource};
use tracing::{debug, info, warn};

use crate::plan::FrameSchedule;
use crate::sink::{EncoderConfig, EncoderSink, VideoFrame};
use crate::EncodeError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSummary {
    pub frames: u64,
    /// Length of the produced timeline.
    pub media_duration: Duration,
    /// Wall-clock time spent rendering and encoding.
    pub elapsed: Duration,
}

/// Renders every frame of `job` into `target` and feeds it to `sink`.
///
/// The target is resized once up front. Each frame is drawn at
/// `index / framerate` seconds, read back, and submitted before the next
/// one is drawn. On success the sink is flushed and then closed. If any step
/// fails the remaining frames are skipped, the sink is aborted and closed
/// without flushing, and the error is returned.
pub fn run_encode<T, K>(
    job: &EncodeJob,
    target: &mut T,
    sink: &mut K,
) -> Result<EncodeSummary, EncodeError>
where
    T: FrameTarget + ?Sized,
    K: EncoderSink + ?Sized,
{
    let started = Instant::now();
    target
        .resize(job.width(), job.height())
        .map_err(|reason| EncodeError::Resize { reason })?;

    let config = EncoderConfig::from(job);
    let mut open = OpenSink::configure(sink, &config)?;

    let schedule = FrameSchedule::new(job);
    info!(
        width = job.width(),
        height = job.height(),
        framerate = job.framerate(),
        total_frames = schedule.total_frames(),
        "encoding"
    );

    let mut frames = 0;
    let mut media_duration = Duration::ZERO;
    for plan in schedule {
        target.draw(plan.sample());
        let image = target
            .capture()
            .map_err(|reason| EncodeError::Capture {
                index: plan.index,
                reason,
            })?;
        let frame = plan.into_frame(image)?;
        media_duration = frame.timestamp + frame.duration;
        open.encode(frame)?;
        frames += 1;
        debug!(index = plan.index, time = plan.time, "submitted frame");
    }

    open.finish()?;
    let summary = EncodeSummary {
        frames,
        media_duration,
        elapsed: started.elapsed(),
    };
    info!(
        frames,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "encode finished"
    );
    Ok(summary)
}

/// Encodes on a session's canvas. Refused while the session is playing.
pub fn encode_in_session<T, S, K>(
    session: &mut Session<T, S>,
    job: &EncodeJob,
    sink: &mut K,
) -> Result<EncodeSummary, EncodeError>
where
    T: FrameTarget,
    S: TimeSource,
    K: EncoderSink + ?Sized,
{
    let target = session.exclusive()?;
    run_encode(job, target, sink)
}

/// A configured sink that is flushed and closed by [`OpenSink::finish`], or
/// aborted and closed if dropped before that.
struct OpenSink<'a, K: EncoderSink + ?Sized> {
    sink: &'a mut K,
    finished: bool,
}

impl<'a, K: EncoderSink + ?Sized> OpenSink<'a, K> {
    fn configure(sink: &'a mut K, config: &EncoderConfig) -> Result<Self, EncodeError> {
        let open = Self {
            sink,
            finished: false,
        };
        open.sink.configure(config)?;
        Ok(open)
    }

    fn encode(&mut self, frame: VideoFrame) -> Result<(), EncodeError> {
        self.sink.encode(frame)
    }

    fn finish(mut self) -> Result<(), EncodeError> {
        self.sink.flush()?;
        self.finished = true;
        self.sink.close()
    }
}

impl<K: EncoderSink + ?Sized> Drop for OpenSink<'_, K> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("encode did not complete; aborting encoder");
        self.sink.abort();
        if let Err(err) = self.sink.close() {
            debug!(%err, "closing aborted encoder failed");
        }
    }
}
