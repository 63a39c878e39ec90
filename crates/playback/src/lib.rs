//! Real-time playback of the scene.
//!
//! [`FrameLoop`] stands in for the host's animation-frame primitive,
//! [`PlaybackController`] implements the play/stop state machine on top of
//! it, and [`Session`] owns the canvas so that playback and frame capture can
//! never draw at the same time.

mod controller;
mod frame_loop;
mod session;

pub use controller::{PlaybackController, PlaybackState};
pub use frame_loop::{FrameLoop, FrameRequestId};
pub use session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback is already running")]
    AlreadyPlaying,
    #[error("playback is not running")]
    NotPlaying,
    #[error("canvas is in use by playback; stop it before capturing frames")]
    Busy,
}
