use std::fs;

use anyhow::{Context, Result};
use jobconfig::{EncodeForm, EncodeJob, JobFile, VideoCodec};

use crate::cli::JobArgs;

/// Builds the job from defaults, the optional job file, and command-line
/// flags, in increasing order of precedence.
pub fn resolve(args: &JobArgs) -> Result<EncodeJob> {
    let mut form = EncodeForm::prefilled();
    let mut codec = VideoCodec::default();

    if let Some(path) = &args.job {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read job file {}", path.display()))?;
        let file = JobFile::from_toml_str(&contents)
            .with_context(|| format!("invalid job file {}", path.display()))?;
        form = form.merge(file.form());
        if let Some(file_codec) = file.codec()? {
            codec = file_codec;
        }
        tracing::debug!(path = %path.display(), "loaded job file");
    }

    form = form.merge(EncodeForm {
        width: args.width.clone(),
        height: args.height.clone(),
        fps: args.fps.clone(),
        seconds: args.seconds.clone(),
        bitrate: args.bitrate.clone(),
    });
    if let Some(raw) = &args.codec {
        codec = raw.parse()?;
    }

    let job = form.parse(codec)?;
    Ok(job)
}
