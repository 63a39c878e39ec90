use renderer::{FrameTarget, SystemTimeSource, TimeSource};
use tracing::{debug, info};

use crate::frame_loop::{FrameLoop, FrameRequestId};
use crate::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

impl PlaybackState {
    /// Label of the control that flips to the other state.
    pub fn button_label(self) -> &'static str {
        match self {
            Self::Stopped => "Play",
            Self::Playing => "Stop",
        }
    }
}

/// Real-time redraw loop governed by a play/stop flag.
///
/// While playing exactly one frame request is outstanding; it is stored here
/// and cancelled by [`PlaybackController::stop`].
#[derive(Debug)]
pub struct PlaybackController<S: TimeSource = SystemTimeSource> {
    clock: S,
    pending: Option<FrameRequestId>,
}

impl PlaybackController<SystemTimeSource> {
    pub fn new() -> Self {
        Self::with_clock(SystemTimeSource::new())
    }
}

impl Default for PlaybackController<SystemTimeSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TimeSource> PlaybackController<S> {
    pub fn with_clock(clock: S) -> Self {
        Self {
            clock,
            pending: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        if self.pending.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.pending.is_some()
    }

    /// Outstanding frame request while playing.
    pub fn pending_request(&self) -> Option<FrameRequestId> {
        self.pending
    }

    pub fn clock(&self) -> &S {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut S {
        &mut self.clock
    }

    /// Records the start time and schedules the first redraw.
    pub fn play(&mut self, frames: &mut FrameLoop) -> Result<FrameRequestId, PlaybackError> {
        if self.pending.is_some() {
            return Err(PlaybackError::AlreadyPlaying);
        }
        Ok(self.start(frames))
    }

    /// Cancels the outstanding redraw. No draw happens after this returns.
    pub fn stop(&mut self, frames: &mut FrameLoop) -> Result<(), PlaybackError> {
        let id = self.pending.take().ok_or(PlaybackError::NotPlaying)?;
        self.halt(id, frames);
        Ok(())
    }

    /// Plays when stopped and stops when playing; returns the new state.
    pub fn toggle(&mut self, frames: &mut FrameLoop) -> PlaybackState {
        match self.pending.take() {
            Some(id) => self.halt(id, frames),
            None => {
                self.start(frames);
            }
        }
        self.state()
    }

    fn start(&mut self, frames: &mut FrameLoop) -> FrameRequestId {
        self.clock.reset();
        let id = frames.request();
        self.pending = Some(id);
        info!("playback started");
        id
    }

    fn halt(&mut self, id: FrameRequestId, frames: &mut FrameLoop) {
        frames.cancel(id);
        info!("playback stopped");
    }

    /// Handles a fired frame request.
    ///
    /// Draws with the elapsed time since `play` and schedules the next
    /// redraw. Requests that are not the outstanding one (cancelled or from
    /// an earlier run) are ignored. Returns whether a frame was drawn.
    pub fn on_animation_frame<T: FrameTarget + ?Sized>(
        &mut self,
        id: FrameRequestId,
        frames: &mut FrameLoop,
        target: &mut T,
    ) -> bool {
        if self.pending != Some(id) {
            debug!(request = id.get(), "ignoring stale frame request");
            return false;
        }
        let sample = self.clock.sample();
        target.draw(sample);
        self.pending = Some(frames.request());
        true
    }
}
