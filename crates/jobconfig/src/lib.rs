//! Encode job parameters.
//!
//! Raw user input arrives as text (form fields, CLI flags, or a TOML job
//! file) and is validated into an immutable [`EncodeJob`] before any frame is
//! rendered. Nothing downstream re-checks these values.

mod codec;
mod file;

use std::fmt;

use serde::Serialize;

pub use codec::{AvcProfile, CodecError, VideoCodec};
pub use file::JobFile;

pub const DEFAULT_WIDTH: u32 = 180;
pub const DEFAULT_HEIGHT: u32 = 320;
pub const DEFAULT_FPS: f64 = 30.0;
pub const DEFAULT_SECONDS: f64 = 1.0;
pub const DEFAULT_BITRATE: u64 = 500_000;

pub const MAX_DIMENSION: u32 = 8192;
/// Keeps the frame interval at ten seconds or less.
pub const MIN_FPS: f64 = 0.1;
pub const MAX_FPS: f64 = 240.0;
pub const MAX_SECONDS: f64 = 3600.0;
pub const MAX_BITRATE: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Width,
    Height,
    Fps,
    Seconds,
    Bitrate,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Width => "width",
            Self::Height => "height",
            Self::Fps => "fps",
            Self::Seconds => "seconds",
            Self::Bitrate => "bitrate",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{field} is required")]
    Missing { field: Field },
    #[error("{field} must be a number, got '{value}'")]
    NotANumber { field: Field, value: String },
    #[error("{field} must be finite")]
    NotFinite { field: Field },
    #[error("{field} must be greater than zero, got {value}")]
    NonPositive { field: Field, value: f64 },
    #[error("{field} must be a whole number, got {value}")]
    NotAnInteger { field: Field, value: f64 },
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall { field: Field, value: f64, min: f64 },
    #[error("{field} must be at most {max}, got {value}")]
    OutOfRange { field: Field, value: f64, max: f64 },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("failed to parse job file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl JobError {
    /// Field the error refers to, if it is a field error.
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Missing { field }
            | Self::NotANumber { field, .. }
            | Self::NotFinite { field }
            | Self::NonPositive { field, .. }
            | Self::NotAnInteger { field, .. }
            | Self::TooSmall { field, .. }
            | Self::OutOfRange { field, .. } => Some(*field),
            Self::Codec(_) | Self::Parse(_) => None,
        }
    }
}

/// Unvalidated job parameters as typed by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeForm {
    pub width: Option<String>,
    pub height: Option<String>,
    pub fps: Option<String>,
    pub seconds: Option<String>,
    pub bitrate: Option<String>,
}

impl EncodeForm {
    /// Form with every field holding its default value.
    pub fn prefilled() -> Self {
        Self {
            width: Some(DEFAULT_WIDTH.to_string()),
            height: Some(DEFAULT_HEIGHT.to_string()),
            fps: Some(DEFAULT_FPS.to_string()),
            seconds: Some(DEFAULT_SECONDS.to_string()),
            bitrate: Some(DEFAULT_BITRATE.to_string()),
        }
    }

    /// Overlays every field that `overrides` sets on top of `self`.
    pub fn merge(mut self, overrides: EncodeForm) -> Self {
        let EncodeForm {
            width,
            height,
            fps,
            seconds,
            bitrate,
        } = overrides;
        self.width = width.or(self.width);
        self.height = height.or(self.height);
        self.fps = fps.or(self.fps);
        self.seconds = seconds.or(self.seconds);
        self.bitrate = bitrate.or(self.bitrate);
        self
    }

    /// Validates every field, reporting the first invalid one.
    pub fn parse(&self, codec: VideoCodec) -> Result<EncodeJob, JobError> {
        let width = whole(Field::Width, self.width.as_deref(), f64::from(MAX_DIMENSION))?;
        let height = whole(Field::Height, self.height.as_deref(), f64::from(MAX_DIMENSION))?;
        let framerate = positive(Field::Fps, self.fps.as_deref(), MAX_FPS)?;
        if framerate < MIN_FPS {
            return Err(JobError::TooSmall {
                field: Field::Fps,
                value: framerate,
                min: MIN_FPS,
            });
        }
        let duration_seconds = positive(Field::Seconds, self.seconds.as_deref(), MAX_SECONDS)?;
        let bitrate = whole(Field::Bitrate, self.bitrate.as_deref(), MAX_BITRATE as f64)?;

        Ok(EncodeJob {
            width: width as u32,
            height: height as u32,
            framerate,
            duration_seconds,
            bitrate: bitrate as u64,
            codec,
        })
    }
}

fn number(field: Field, raw: Option<&str>) -> Result<f64, JobError> {
    let text = raw.map(str::trim).filter(|text| !text.is_empty());
    let Some(text) = text else {
        return Err(JobError::Missing { field });
    };
    let value = text.parse::<f64>().map_err(|_| JobError::NotANumber {
        field,
        value: text.to_string(),
    })?;
    if !value.is_finite() {
        return Err(JobError::NotFinite { field });
    }
    Ok(value)
}

fn positive(field: Field, raw: Option<&str>, max: f64) -> Result<f64, JobError> {
    let value = number(field, raw)?;
    if value <= 0.0 {
        return Err(JobError::NonPositive { field, value });
    }
    if value > max {
        return Err(JobError::OutOfRange { field, value, max });
    }
    Ok(value)
}

fn whole(field: Field, raw: Option<&str>, max: f64) -> Result<f64, JobError> {
    let value = positive(field, raw, max)?;
    if value.fract() != 0.0 {
        return Err(JobError::NotAnInteger { field, value });
    }
    Ok(value)
}

/// Validated, immutable parameters of one encode run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeJob {
    width: u32,
    height: u32,
    framerate: f64,
    duration_seconds: f64,
    bitrate: u64,
    codec: VideoCodec,
}

impl EncodeJob {
    /// Builds a job from already-typed values, applying the same checks as
    /// [`EncodeForm::parse`].
    pub fn new(
        width: u32,
        height: u32,
        framerate: f64,
        duration_seconds: f64,
        bitrate: u64,
        codec: VideoCodec,
    ) -> Result<Self, JobError> {
        EncodeForm {
            width: Some(width.to_string()),
            height: Some(height.to_string()),
            fps: Some(framerate.to_string()),
            seconds: Some(duration_seconds.to_string()),
            bitrate: Some(bitrate.to_string()),
        }
        .parse(codec)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn framerate(&self) -> f64 {
        self.framerate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// `duration_seconds * framerate`; may be fractional.
    pub fn total_frames(&self) -> f64 {
        self.duration_seconds * self.framerate
    }

    /// Seconds between consecutive frames.
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.framerate
    }

    /// Number of frames an encode produces: every index `i` with
    /// `i < total_frames()`.
    pub fn frame_count(&self) -> u64 {
        self.total_frames().ceil() as u64
    }
}

impl Default for EncodeJob {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            framerate: DEFAULT_FPS,
            duration_seconds: DEFAULT_SECONDS,
            bitrate: DEFAULT_BITRATE,
            codec: VideoCodec::default(),
        }
    }
}
