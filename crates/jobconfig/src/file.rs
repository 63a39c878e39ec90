use std::fmt;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::{EncodeForm, JobError, VideoCodec};

/// Encode job stored as TOML.
///
/// ```toml
/// width = 180
/// height = 320
/// fps = 29.97
/// seconds = "2s 500ms"
/// bitrate = 500000
/// codec = "vp09.00.10.08"
/// ```
///
/// Every key is optional. Values are folded into an [`EncodeForm`] and go
/// through the same validation as typed input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    #[serde(default, deserialize_with = "deserialize_number_text")]
    pub width: Option<String>,
    #[serde(default, deserialize_with = "deserialize_number_text")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "deserialize_number_text")]
    pub fps: Option<String>,
    #[serde(default, deserialize_with = "deserialize_seconds_text")]
    pub seconds: Option<String>,
    #[serde(default, deserialize_with = "deserialize_number_text")]
    pub bitrate: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
}

impl JobFile {
    pub fn from_toml_str(input: &str) -> Result<Self, JobError> {
        Ok(toml::from_str(input)?)
    }

    pub fn form(&self) -> EncodeForm {
        EncodeForm {
            width: self.width.clone(),
            height: self.height.clone(),
            fps: self.fps.clone(),
            seconds: self.seconds.clone(),
            bitrate: self.bitrate.clone(),
        }
    }

    /// Codec named by the file, if any.
    pub fn codec(&self) -> Result<Option<VideoCodec>, JobError> {
        self.codec
            .as_deref()
            .map(|raw| raw.parse::<VideoCodec>().map_err(JobError::from))
            .transpose()
    }
}

fn deserialize_number_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(NumberText { durations: false })
}

fn deserialize_seconds_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(NumberText { durations: true })
}

/// Accepts TOML integers, floats and strings, keeping the text for later
/// validation. With `durations` set, strings that are not plain numbers are
/// read as humantime durations and converted to seconds.
struct NumberText {
    durations: bool,
}

impl<'de> de::Visitor<'de> for NumberText {
    type Value = Option<String>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.durations {
            formatter.write_str("a number of seconds or human-readable duration")
        } else {
            formatter.write_str("a number")
        }
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if !self.durations || v.trim().parse::<f64>().is_ok() {
            return Ok(Some(v.to_string()));
        }
        humantime::parse_duration(v.trim())
            .map(|duration| Some(duration.as_secs_f64().to_string()))
            .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Some(v.to_string()))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Some(v.to_string()))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Some(v.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, VideoCodec};

    #[test]
    fn parses_full_job_file() {
        let file = JobFile::from_toml_str(
            r#"
width = 64
height = 48
fps = 29.97
seconds = 2
bitrate = 250000
codec = "vp8"
"#,
        )
        .unwrap();
        let job = file.form().parse(file.codec().unwrap().unwrap()).unwrap();
        assert_eq!((job.width(), job.height()), (64, 48));
        assert_eq!(job.framerate(), 29.97);
        assert_eq!(job.duration_seconds(), 2.0);
        assert_eq!(job.codec(), VideoCodec::Vp8);
    }

    #[test]
    fn seconds_accept_humantime() {
        let file = JobFile::from_toml_str("seconds = \"2s 500ms\"").unwrap();
        assert_eq!(file.seconds.as_deref(), Some("2.5"));
        let numeric = JobFile::from_toml_str("seconds = \"1.5\"").unwrap();
        assert_eq!(numeric.seconds.as_deref(), Some("1.5"));
    }

    #[test]
    fn bad_duration_is_a_parse_error() {
        let err = JobFile::from_toml_str("seconds = \"soon\"").unwrap_err();
        assert!(matches!(err, JobError::Parse(_)));
        assert!(err.to_string().contains("invalid duration 'soon'"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(JobFile::from_toml_str("colour = \"red\"").is_err());
    }

    #[test]
    fn negative_values_reach_validation() {
        let file = JobFile::from_toml_str("width = -4").unwrap();
        let err = EncodeForm::prefilled()
            .merge(file.form())
            .parse(VideoCodec::default())
            .unwrap_err();
        assert_eq!(err.field(), Some(Field::Width));
    }

    #[test]
    fn unknown_codec_is_reported() {
        let file = JobFile::from_toml_str("codec = \"hevc\"").unwrap();
        assert!(matches!(file.codec(), Err(JobError::Codec(_))));
    }
}
