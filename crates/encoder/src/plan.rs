use std::time::Duration;

use image::RgbaImage;
use jobconfig::EncodeJob;
use renderer::TimeSample;

use crate::sink::VideoFrame;
use crate::EncodeError;

/// Position of one output frame on the synthetic timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub index: u64,
    /// `index * (1 / framerate)`, in seconds.
    pub time: f64,
    /// Display duration, `1 / framerate` seconds.
    pub duration: f64,
}

impl FramePlan {
    /// Time sample handed to the renderer. `iFrame` follows the frame index
    /// so captured frames depend on nothing but the plan.
    pub fn sample(&self) -> TimeSample {
        TimeSample::new(self.time as f32, self.index)
    }

    /// Tags a captured image with this plan's slot on the timeline.
    ///
    /// The timestamp is `index` whole intervals, so every frame ends exactly
    /// where the next one starts.
    pub fn into_frame(self, image: RgbaImage) -> Result<VideoFrame, EncodeError> {
        let timeline = || EncodeError::Timeline {
            index: self.index,
            seconds: self.time,
        };
        let duration = Duration::try_from_secs_f64(self.duration).map_err(|_| timeline())?;
        let timestamp = u32::try_from(self.index)
            .ok()
            .and_then(|steps| duration.checked_mul(steps))
            .ok_or_else(timeline)?;
        Ok(VideoFrame {
            index: self.index,
            timestamp,
            duration,
            image,
        })
    }
}

/// Iterates the frames of a job: every index `i` with
/// `i < duration_seconds * framerate`, in ascending order.
///
/// The bound is compared unrounded, so a fractional total yields one extra
/// partial frame (`1 s` at `3.33 fps` gives four frames).
#[derive(Debug, Clone)]
pub struct FrameSchedule {
    total: f64,
    interval: f64,
    next: u64,
}

impl FrameSchedule {
    pub fn new(job: &EncodeJob) -> Self {
        Self {
            total: job.total_frames(),
            interval: job.frame_interval(),
            next: 0,
        }
    }

    pub fn total_frames(&self) -> f64 {
        self.total
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }
}

impl Iterator for FrameSchedule {
    type Item = FramePlan;

    fn next(&mut self) -> Option<FramePlan> {
        if (self.next as f64) >= self.total {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(FramePlan {
            index,
            time: index as f64 * self.interval,
            duration: self.interval,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.next as f64).max(0.0).ceil() as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobconfig::VideoCodec;

    fn job(fps: f64, seconds: f64) -> EncodeJob {
        EncodeJob::new(16, 16, fps, seconds, 100_000, VideoCodec::default()).unwrap()
    }

    #[test]
    fn thirty_frames_for_one_second_at_thirty_fps() {
        let plans: Vec<_> = FrameSchedule::new(&job(30.0, 1.0)).collect();
        assert_eq!(plans.len(), 30);
        for (i, plan) in plans.iter().enumerate() {
            assert_eq!(plan.index, i as u64);
            assert_eq!(plan.time, i as f64 * (1.0 / 30.0));
            assert_eq!(plan.duration, 1.0 / 30.0);
        }
    }

    #[test]
    fn fractional_seconds() {
        assert_eq!(FrameSchedule::new(&job(10.0, 2.5)).count(), 25);
    }

    #[test]
    fn thirds() {
        let times: Vec<f64> = FrameSchedule::new(&job(3.0, 1.0))
            .map(|plan| plan.time)
            .collect();
        assert_eq!(times, vec![0.0, 1.0 / 3.0, 2.0 / 3.0]);
    }

    #[test]
    fn fractional_total_keeps_strict_bound() {
        let schedule = FrameSchedule::new(&job(3.33, 1.0));
        assert_eq!(schedule.size_hint(), (4, Some(4)));
        assert_eq!(schedule.count(), 4);
    }

    #[test]
    fn plan_becomes_frame() {
        let plan = FramePlan {
            index: 3,
            time: 0.75,
            duration: 0.25,
        };
        assert_eq!(plan.sample(), TimeSample::new(0.75, 3));
        let frame = plan.into_frame(RgbaImage::new(2, 2)).unwrap();
        assert_eq!(frame.timestamp, Duration::from_millis(750));
        assert_eq!(frame.duration, Duration::from_millis(250));
    }

    #[test]
    fn frame_durations_are_contiguous() {
        for fps in [3.0, 29.97, 30.0, 59.94, 240.0] {
            let frames: Vec<_> = FrameSchedule::new(&job(fps, 10.0))
                .map(|plan| plan.into_frame(RgbaImage::new(1, 1)).unwrap())
                .collect();
            assert_eq!(frames[0].timestamp, Duration::ZERO);
            for pair in frames.windows(2) {
                assert_eq!(pair[0].timestamp + pair[0].duration, pair[1].timestamp);
            }
        }
    }

    #[test]
    fn interval_that_overflows_duration_is_an_error() {
        let plan = FramePlan {
            index: 1,
            time: 1e20,
            duration: 1e20,
        };
        assert!(matches!(
            plan.into_frame(RgbaImage::new(1, 1)),
            Err(EncodeError::Timeline { index: 1, .. })
        ));
    }
}
