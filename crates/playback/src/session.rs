use renderer::{FrameTarget, SystemTimeSource, TimeSource};
use tracing::debug;

use crate::controller::{PlaybackController, PlaybackState};
use crate::frame_loop::{FrameLoop, FrameRequestId};
use crate::PlaybackError;

/// One viewer session: the canvas, its playback controller and the frame
/// loop driving it.
///
/// Anything else that wants to draw (frame capture) borrows the canvas
/// through [`Session::exclusive`], which is refused while playing. Holding
/// that borrow in turn keeps `play` from being called until it ends.
pub struct Session<T: FrameTarget, S: TimeSource = SystemTimeSource> {
    target: T,
    controller: PlaybackController<S>,
    frames: FrameLoop,
}

impl<T: FrameTarget> Session<T, SystemTimeSource> {
    pub fn new(target: T) -> Self {
        Self::with_clock(target, SystemTimeSource::new())
    }
}

impl<T: FrameTarget, S: TimeSource> Session<T, S> {
    pub fn with_clock(target: T, clock: S) -> Self {
        Self {
            target,
            controller: PlaybackController::with_clock(clock),
            frames: FrameLoop::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn play(&mut self) -> Result<FrameRequestId, PlaybackError> {
        self.controller.play(&mut self.frames)
    }

    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        self.controller.stop(&mut self.frames)
    }

    pub fn toggle(&mut self) -> PlaybackState {
        self.controller.toggle(&mut self.frames)
    }

    /// One display refresh: runs every due frame request and returns how
    /// many frames were drawn.
    pub fn tick(&mut self) -> usize {
        let due = self.frames.take_due();
        let mut drawn = 0;
        for id in due {
            if self
                .controller
                .on_animation_frame(id, &mut self.frames, &mut self.target)
            {
                drawn += 1;
            }
        }
        drawn
    }

    /// Navigating away: stops playback if it is running.
    pub fn leave(&mut self) {
        if self.controller.is_playing() {
            debug!("leaving session while playing");
            self.controller.toggle(&mut self.frames);
        }
    }

    /// Mutable access to the canvas for work other than playback.
    pub fn exclusive(&mut self) -> Result<&mut T, PlaybackError> {
        if self.controller.is_playing() {
            return Err(PlaybackError::Busy);
        }
        Ok(&mut self.target)
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn clock_mut(&mut self) -> &mut S {
        self.controller.clock_mut()
    }

    pub fn frames(&self) -> &FrameLoop {
        &self.frames
    }

    pub fn into_target(self) -> T {
        self.target
    }
}
