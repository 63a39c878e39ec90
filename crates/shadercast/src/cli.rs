use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::GpuPowerPreference;

#[derive(Parser, Debug)]
#[command(
    name = "shadercast",
    author,
    version,
    about = "Render a GLSL shader animation and encode it to video"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render every frame of a job and stream it through ffmpeg.
    Encode(EncodeArgs),
    /// Play the animation in real time on the offscreen canvas.
    Play(PlayArgs),
    /// Validate a job and print its frame schedule as JSON.
    Plan(PlanArgs),
}

/// Encode job fields. Values are validated together; any of them may come
/// from `--job` instead.
#[derive(Args, Debug, Default)]
pub struct JobArgs {
    /// TOML job file; flags given on the command line take precedence.
    #[arg(long, value_name = "PATH")]
    pub job: Option<PathBuf>,

    /// Output width in pixels [default: 180].
    #[arg(long, value_name = "PIXELS")]
    pub width: Option<String>,

    /// Output height in pixels [default: 320].
    #[arg(long, value_name = "PIXELS")]
    pub height: Option<String>,

    /// Frames per second [default: 30].
    #[arg(long, value_name = "FPS")]
    pub fps: Option<String>,

    /// Clip length in seconds [default: 1].
    #[arg(long, value_name = "SECONDS")]
    pub seconds: Option<String>,

    /// Target bitrate in bits per second [default: 500000].
    #[arg(long, value_name = "BPS")]
    pub bitrate: Option<String>,

    /// Codec string: `avc1.42001f`, `vp8`, `vp09.00.10.08`, ...
    #[arg(long, value_name = "CODEC")]
    pub codec: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShaderArgs {
    /// Vertex shader source (GLSL ES 3.00); the bundled shader is used if omitted.
    #[arg(long, value_name = "PATH", requires = "fragment")]
    pub vertex: Option<PathBuf>,

    /// Fragment shader source (GLSL ES 3.00 or ShaderToy `mainImage`).
    #[arg(long, value_name = "PATH", requires = "vertex")]
    pub fragment: Option<PathBuf>,

    /// GPU power preference: `high` or `low`.
    #[arg(
        long,
        value_name = "PREFERENCE",
        value_parser = parse_gpu_power,
        default_value = "high"
    )]
    pub gpu_power: GpuPowerPreference,

    /// Refuse software adapters.
    #[arg(long)]
    pub require_gpu: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub job: JobArgs,

    #[command(flatten)]
    pub shaders: ShaderArgs,

    /// File that receives the encoded stream (`.h264` for avc, `.ivf` for vp8/vp9).
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    /// ffmpeg executable used as the encoder.
    #[arg(
        long,
        value_name = "PATH",
        env = "SHADERCAST_FFMPEG",
        default_value = "ffmpeg"
    )]
    pub ffmpeg: PathBuf,
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    #[command(flatten)]
    pub shaders: ShaderArgs,

    /// Canvas size.
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_size,
        default_value = "420x236"
    )]
    pub size: (u32, u32),

    /// How long to play before stopping.
    #[arg(long, value_name = "SECONDS", default_value_t = 3.0)]
    pub seconds: f64,

    /// Simulated display refresh rate.
    #[arg(long, value_name = "HZ", default_value_t = 60.0)]
    pub refresh_hz: f64,

    /// Write the last played frame to a PNG after stopping.
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub job: JobArgs,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "high" | "high-performance" => Ok(GpuPowerPreference::High),
        "low" | "low-power" => Ok(GpuPowerPreference::Low),
        other => Err(format!(
            "unknown power preference '{other}'; expected high or low"
        )),
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT, e.g. 420x236".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;
    if width == 0 || height == 0 {
        return Err("canvas dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("420x236"), Ok((420, 236)));
        assert_eq!(parse_size(" 64 X 32 "), Ok((64, 32)));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("wide").is_err());
    }

    #[test]
    fn parses_power_preference() {
        assert_eq!(parse_gpu_power("LOW"), Ok(GpuPowerPreference::Low));
        assert_eq!(
            parse_gpu_power("high-performance"),
            Ok(GpuPowerPreference::High)
        );
        assert!(parse_gpu_power("turbo").is_err());
    }

    #[test]
    fn encode_flags_land_in_job_args() {
        let cli = Cli::try_parse_from([
            "shadercast",
            "encode",
            "--width",
            "64",
            "--seconds",
            "2.5",
            "--output",
            "out.h264",
        ])
        .unwrap();
        let Command::Encode(args) = cli.command else {
            panic!("expected encode");
        };
        assert_eq!(args.job.width.as_deref(), Some("64"));
        assert_eq!(args.job.seconds.as_deref(), Some("2.5"));
        assert_eq!(args.job.height, None);
        assert_eq!(args.ffmpeg, PathBuf::from("ffmpeg"));
    }
}
