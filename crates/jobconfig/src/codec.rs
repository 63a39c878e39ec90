use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported codec '{0}'; expected avc1.*, vp8 or vp09.*")]
    Unsupported(String),
    #[error("malformed codec string '{codec}': {reason}")]
    Malformed { codec: String, reason: String },
}

/// H.264 profiles reachable through an `avc1.PPCCLL` codec string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcProfile {
    Baseline,
    Main,
    High,
}

impl AvcProfile {
    fn from_idc(idc: u8) -> Option<Self> {
        match idc {
            0x42 => Some(Self::Baseline),
            0x4d => Some(Self::Main),
            0x64 => Some(Self::High),
            _ => None,
        }
    }

    fn idc(self) -> u8 {
        match self {
            Self::Baseline => 0x42,
            Self::Main => 0x4d,
            Self::High => 0x64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Main => "main",
            Self::High => "high",
        }
    }
}

/// Codec identifier plus profile/level, parsed from a registry-style codec
/// string such as `avc1.42001f`, `vp8` or `vp09.00.10.08`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Avc {
        profile: AvcProfile,
        constraints: u8,
        level_idc: u8,
        /// `avc3`: parameter sets travel in band instead of in the sample entry.
        in_band: bool,
    },
    Vp8,
    Vp9 {
        profile: u8,
        level: u8,
        bit_depth: u8,
    },
}

impl VideoCodec {
    /// Dotted level (`3.1`), if the codec string carries one.
    pub fn level_name(&self) -> Option<String> {
        match self {
            Self::Avc { level_idc, .. } => Some(format!("{}.{}", level_idc / 10, level_idc % 10)),
            Self::Vp8 => None,
            Self::Vp9 { level, .. } => Some(format!("{}.{}", level / 10, level % 10)),
        }
    }
}

impl Default for VideoCodec {
    /// Constrained baseline H.264 at level 3.1 (`avc1.42001f`).
    fn default() -> Self {
        Self::Avc {
            profile: AvcProfile::Baseline,
            constraints: 0x00,
            level_idc: 0x1f,
            in_band: false,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avc {
                profile,
                constraints,
                level_idc,
                in_band,
            } => write!(
                f,
                "{}.{:02x}{:02x}{:02x}",
                if *in_band { "avc3" } else { "avc1" },
                profile.idc(),
                constraints,
                level_idc
            ),
            Self::Vp8 => f.write_str("vp8"),
            Self::Vp9 {
                profile,
                level,
                bit_depth,
            } => write!(f, "vp09.{profile:02}.{level:02}.{bit_depth:02}"),
        }
    }
}

impl FromStr for VideoCodec {
    type Err = CodecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let codec = value.trim();
        let malformed = |reason: &str| CodecError::Malformed {
            codec: codec.to_string(),
            reason: reason.to_string(),
        };

        if codec.eq_ignore_ascii_case("vp8") {
            return Ok(Self::Vp8);
        }

        let avc = codec
            .strip_prefix("avc1.")
            .map(|rest| (rest, false))
            .or_else(|| codec.strip_prefix("avc3.").map(|rest| (rest, true)));
        if let Some((rest, in_band)) = avc {
            if rest.len() != 6 || !rest.chars().all(|ch| ch.is_ascii_hexdigit()) {
                return Err(malformed("expected six hex digits after the avc prefix"));
            }
            let byte = |index: usize| {
                u8::from_str_radix(&rest[index..index + 2], 16)
                    .map_err(|_| malformed("invalid hex byte"))
            };
            let profile_idc = byte(0)?;
            let constraints = byte(2)?;
            let level_idc = byte(4)?;
            let profile = AvcProfile::from_idc(profile_idc).ok_or_else(|| {
                malformed(&format!(
                    "profile_idc 0x{profile_idc:02x} is not baseline, main or high"
                ))
            })?;
            if !(10..=62).contains(&level_idc) {
                return Err(malformed(&format!("level_idc {level_idc} is out of range")));
            }
            return Ok(Self::Avc {
                profile,
                constraints,
                level_idc,
                in_band,
            });
        }

        if let Some(rest) = codec.strip_prefix("vp09.") {
            let parts: Vec<&str> = rest.split('.').collect();
            if parts.len() < 3 {
                return Err(malformed("expected vp09.<profile>.<level>.<bit depth>"));
            }
            let number = |raw: &str| {
                raw.parse::<u8>()
                    .map_err(|_| malformed(&format!("'{raw}' is not a number")))
            };
            let profile = number(parts[0])?;
            let level = number(parts[1])?;
            let bit_depth = number(parts[2])?;
            if profile > 3 {
                return Err(malformed("profile must be between 0 and 3"));
            }
            if !matches!(bit_depth, 8 | 10 | 12) {
                return Err(malformed("bit depth must be 8, 10 or 12"));
            }
            return Ok(Self::Vp9 {
                profile,
                level,
                bit_depth,
            });
        }

        Err(CodecError::Unsupported(codec.to_string()))
    }
}

impl Serialize for VideoCodec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
