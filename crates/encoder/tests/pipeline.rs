use std::time::Duration;

use anyhow::{bail, Result};
use encoder::{
    encode_in_session, run_encode, EncodeError, EncoderConfig, EncoderSink, FfmpegSink,
    InMemorySink, SinkCall, SinkCallbacks, VideoFrame,
};
use image::{Rgba, RgbaImage};
use jobconfig::{EncodeForm, EncodeJob, VideoCodec};
use playback::{PlaybackError, Session};
use renderer::{FrameTarget, ManualTimeSource, TimeSample};

/// Canvas that paints the frame index of the last draw into every pixel.
struct FakeCanvas {
    size: (u32, u32),
    last: Option<TimeSample>,
    resizes: Vec<(u32, u32)>,
    draws: Vec<TimeSample>,
    captures: usize,
    fail_capture_at: Option<u64>,
}

impl FakeCanvas {
    fn new() -> Self {
        Self {
            size: (420, 236),
            last: None,
            resizes: Vec::new(),
            draws: Vec::new(),
            captures: 0,
            fail_capture_at: None,
        }
    }
}

impl FrameTarget for FakeCanvas {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.size = (width, height);
        self.resizes.push((width, height));
        Ok(())
    }

    fn draw(&mut self, sample: TimeSample) {
        self.last = Some(sample);
        self.draws.push(sample);
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        let Some(sample) = self.last else {
            bail!("nothing drawn");
        };
        if Some(sample.frame_index) == self.fail_capture_at {
            bail!("readback lost");
        }
        self.captures += 1;
        let shade = (sample.frame_index % 256) as u8;
        Ok(RgbaImage::from_pixel(
            self.size.0,
            self.size.1,
            Rgba([shade, 0, 0, 255]),
        ))
    }
}

fn job(width: u32, height: u32, fps: f64, seconds: f64) -> EncodeJob {
    EncodeJob::new(width, height, fps, seconds, 500_000, VideoCodec::default()).unwrap()
}

fn encoded_indices(sink: &InMemorySink) -> Vec<u64> {
    sink.calls()
        .iter()
        .filter_map(|call| match call {
            SinkCall::Encode { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

#[test]
fn default_job_produces_thirty_frames_then_flush_then_close() {
    let job = EncodeForm::prefilled()
        .parse(VideoCodec::default())
        .unwrap();
    let mut canvas = FakeCanvas::new();
    let mut sink = InMemorySink::new();

    let summary = run_encode(&job, &mut canvas, &mut sink).unwrap();

    assert_eq!(summary.frames, 30);
    assert_eq!(canvas.resizes, vec![(180, 320)]);
    assert_eq!(canvas.captures, 30);

    let calls = sink.calls();
    assert_eq!(
        calls.first(),
        Some(&SinkCall::Configure(EncoderConfig {
            codec: VideoCodec::default(),
            width: 180,
            height: 320,
            framerate: 30.0,
            bitrate: 500_000,
        }))
    );
    assert_eq!(&calls[calls.len() - 2..], &[SinkCall::Flush, SinkCall::Close]);
    assert_eq!(
        calls.iter().filter(|c| **c == SinkCall::Flush).count(),
        1
    );
    assert_eq!(
        calls.iter().filter(|c| **c == SinkCall::Close).count(),
        1
    );

    let interval = 1.0 / 30.0;
    let step = Duration::from_secs_f64(interval);
    for (i, frame) in sink.frames().iter().enumerate() {
        assert_eq!(frame.index, i as u64);
        assert_eq!(frame.timestamp, step * i as u32);
        assert_eq!(frame.duration, step);
        assert_eq!(frame.image.dimensions(), (180, 320));
        assert_eq!(frame.image.get_pixel(0, 0)[0], i as u8);
    }
    for (i, sample) in canvas.draws.iter().enumerate() {
        assert_eq!(sample.seconds, (i as f64 * interval) as f32);
        assert_eq!(sample.frame_index, i as u64);
    }
}

#[test]
fn submission_order_is_strictly_increasing() {
    let mut canvas = FakeCanvas::new();
    let mut sink = InMemorySink::new();
    run_encode(&job(16, 16, 10.0, 2.5), &mut canvas, &mut sink).unwrap();

    let indices = encoded_indices(&sink);
    assert_eq!(indices.len(), 25);
    assert!(indices.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn one_second_at_three_fps_draws_thirds() {
    let mut canvas = FakeCanvas::new();
    let mut sink = InMemorySink::new();
    let summary = run_encode(&job(16, 16, 3.0, 1.0), &mut canvas, &mut sink).unwrap();

    assert_eq!(summary.frames, 3);
    let times: Vec<f32> = canvas.draws.iter().map(|s| s.seconds).collect();
    assert_eq!(
        times,
        vec![0.0, (1.0f64 / 3.0) as f32, (2.0f64 / 3.0) as f32]
    );
    assert!((summary.media_duration.as_secs_f64() - 1.0).abs() < 1e-6);
}

#[test]
fn capture_failure_skips_remaining_frames_and_flush() {
    let mut canvas = FakeCanvas::new();
    canvas.fail_capture_at = Some(4);
    let mut sink = InMemorySink::new();

    let err = run_encode(&job(16, 16, 10.0, 1.0), &mut canvas, &mut sink).unwrap_err();

    assert!(matches!(err, EncodeError::Capture { index: 4, .. }));
    assert!(err.to_string().contains("readback lost"));
    assert_eq!(encoded_indices(&sink), vec![0, 1, 2, 3]);
    assert_eq!(canvas.draws.len(), 5);
    let calls = sink.calls();
    assert!(!calls.contains(&SinkCall::Flush));
    assert_eq!(&calls[calls.len() - 2..], &[SinkCall::Abort, SinkCall::Close]);
}

/// Sink that reports an encoder error on a chosen frame.
struct FailingSink {
    inner: InMemorySink,
    fail_at: u64,
}

impl EncoderSink for FailingSink {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncodeError> {
        self.inner.configure(config)
    }

    fn encode(&mut self, frame: VideoFrame) -> Result<(), EncodeError> {
        if frame.index == self.fail_at {
            return Err(EncodeError::Encoder("bitstream overflow".into()));
        }
        self.inner.encode(frame)
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<(), EncodeError> {
        self.inner.close()
    }

    fn abort(&mut self) {
        self.inner.abort()
    }
}

#[test]
fn encoder_error_stops_the_pipeline() {
    let mut canvas = FakeCanvas::new();
    let mut sink = FailingSink {
        inner: InMemorySink::new(),
        fail_at: 2,
    };

    let err = run_encode(&job(16, 16, 10.0, 1.0), &mut canvas, &mut sink).unwrap_err();

    assert!(matches!(err, EncodeError::Encoder(ref message) if message == "bitstream overflow"));
    assert_eq!(canvas.draws.len(), 3);
    assert_eq!(encoded_indices(&sink.inner), vec![0, 1]);
    assert!(sink.inner.is_closed());
    assert!(!sink.inner.calls().contains(&SinkCall::Flush));
}

/// Canvas whose readback ignores resizes.
struct StuckCanvas(FakeCanvas);

impl FrameTarget for StuckCanvas {
    fn size(&self) -> (u32, u32) {
        self.0.size()
    }

    fn resize(&mut self, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self, sample: TimeSample) {
        self.0.draw(sample)
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        self.0.capture()
    }
}

#[test]
fn mismatched_capture_size_is_rejected() {
    let mut canvas = StuckCanvas(FakeCanvas::new());
    let mut sink = InMemorySink::new();

    let err = run_encode(&job(16, 16, 10.0, 1.0), &mut canvas, &mut sink).unwrap_err();

    assert!(matches!(
        err,
        EncodeError::FrameSize {
            index: 0,
            expected: (16, 16),
            actual: (420, 236)
        }
    ));
    assert!(sink.frames().is_empty());
}

#[test]
fn encoding_is_refused_while_playing() {
    let mut session = Session::with_clock(FakeCanvas::new(), ManualTimeSource::new());
    session.play().unwrap();

    let mut sink = InMemorySink::new();
    let err = encode_in_session(&mut session, &job(16, 16, 10.0, 1.0), &mut sink).unwrap_err();
    assert!(matches!(err, EncodeError::Playback(PlaybackError::Busy)));
    assert!(sink.calls().is_empty());

    session.stop().unwrap();
    let summary = encode_in_session(&mut session, &job(16, 16, 10.0, 1.0), &mut sink).unwrap();
    assert_eq!(summary.frames, 10);
    assert_eq!(session.target().size(), (16, 16));
}

#[cfg(unix)]
#[test]
fn encoder_process_failure_carries_its_stderr() {
    use std::cell::Cell;
    use std::os::unix::fs::PermissionsExt;
    use std::rc::Rc;

    let dir = tempfile::TempDir::new().unwrap();
    let program = dir.path().join("ffmpeg");
    std::fs::write(&program, "#!/bin/sh\necho 'boom: unsupported' >&2\nexit 3\n").unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

    let errors = Rc::new(Cell::new(0));
    let callbacks = SinkCallbacks::new().on_error({
        let errors = Rc::clone(&errors);
        move |_| errors.set(errors.get() + 1)
    });
    let mut sink = FfmpegSink::new(&program, callbacks);
    let mut canvas = FakeCanvas::new();

    let err = run_encode(&job(180, 320, 30.0, 1.0), &mut canvas, &mut sink).unwrap_err();
    assert!(matches!(err, EncodeError::Encoder(_)));
    assert!(err.to_string().contains("boom: unsupported"), "{err}");
    assert_eq!(errors.get(), 1);
}
