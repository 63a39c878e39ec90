use std::time::Duration;

use anyhow::Result;
use image::RgbaImage;
use playback::{PlaybackError, PlaybackState, Session};
use renderer::{FrameTarget, ManualTimeSource, TimeSample};

#[derive(Default)]
struct RecordingTarget {
    draws: Vec<TimeSample>,
}

impl FrameTarget for RecordingTarget {
    fn size(&self) -> (u32, u32) {
        (420, 236)
    }

    fn resize(&mut self, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self, sample: TimeSample) {
        self.draws.push(sample);
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        Ok(RgbaImage::new(420, 236))
    }
}

fn session() -> Session<RecordingTarget, ManualTimeSource> {
    Session::with_clock(RecordingTarget::default(), ManualTimeSource::new())
}

#[test]
fn play_then_stop_draws_nothing() {
    let mut session = session();
    session.play().unwrap();
    session.stop().unwrap();
    assert_eq!(session.tick(), 0);
    assert_eq!(session.tick(), 0);
    assert!(session.target().draws.is_empty());
}

#[test]
fn only_continuations_scheduled_while_playing_fire() {
    let mut session = session();
    assert_eq!(session.toggle(), PlaybackState::Playing);
    assert_eq!(session.tick(), 1);
    assert_eq!(session.tick(), 1);
    assert_eq!(session.toggle(), PlaybackState::Stopped);
    assert_eq!(session.tick(), 0);
    assert_eq!(session.target().draws.len(), 2);
    assert_eq!(session.frames().pending(), 0);
}

#[test]
fn play_while_playing_keeps_a_single_loop() {
    let mut session = session();
    session.play().unwrap();
    assert_eq!(session.play(), Err(PlaybackError::AlreadyPlaying));
    assert_eq!(session.tick(), 1);
    assert_eq!(session.frames().pending(), 1);
}

#[test]
fn draws_use_time_elapsed_since_play() {
    let mut session = session();
    session.clock_mut().advance(Duration::from_secs(5));
    session.play().unwrap();

    session.clock_mut().advance(Duration::from_millis(250));
    session.tick();
    session.clock_mut().advance(Duration::from_millis(250));
    session.tick();

    let draws = &session.target().draws;
    assert_eq!(draws[0], TimeSample::new(0.25, 0));
    assert_eq!(draws[1], TimeSample::new(0.5, 1));
}

#[test]
fn replay_restarts_the_clock() {
    let mut session = session();
    session.play().unwrap();
    session.clock_mut().advance(Duration::from_secs(2));
    session.tick();
    session.stop().unwrap();

    session.play().unwrap();
    session.clock_mut().advance(Duration::from_millis(500));
    session.tick();

    let last = *session.target().draws.last().unwrap();
    assert_eq!(last, TimeSample::new(0.5, 0));
}

#[test]
fn canvas_is_exclusive_while_playing() {
    let mut session = session();
    session.play().unwrap();
    assert!(matches!(session.exclusive(), Err(PlaybackError::Busy)));
    session.stop().unwrap();
    let target = session.exclusive().unwrap();
    target.draw(TimeSample::new(1.0, 0));
    assert_eq!(session.target().draws.len(), 1);
}

#[test]
fn leaving_stops_playback() {
    let mut session = session();
    session.play().unwrap();
    session.leave();
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert_eq!(session.tick(), 0);
    session.leave();
    assert_eq!(session.state(), PlaybackState::Stopped);
}
