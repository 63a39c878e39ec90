use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use encoder::{encode_in_session, FfmpegSink, FrameSchedule, SinkCallbacks};
use jobconfig::EncodeJob;
use playback::Session;
use renderer::{Renderer, RendererConfig, ShaderSources};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, EncodeArgs, PlanArgs, PlayArgs, ShaderArgs};
use crate::job;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    match cli.command {
        Command::Encode(args) => encode(args),
        Command::Play(args) => play(args),
        Command::Plan(args) => plan(args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_renderer(args: &ShaderArgs, surface_size: (u32, u32)) -> Result<Renderer> {
    let shaders = match (&args.vertex, &args.fragment) {
        (Some(vertex), Some(fragment)) => ShaderSources::load(vertex, fragment)?,
        _ => ShaderSources::default(),
    };
    Renderer::new(RendererConfig {
        surface_size,
        shaders,
        gpu_power: args.gpu_power,
        allow_software: !args.require_gpu,
    })
}

/// Encoded stream written as it arrives from the encoder.
struct StreamFile {
    writer: BufWriter<File>,
    bytes: u64,
    error: Option<std::io::Error>,
}

fn encode(args: EncodeArgs) -> Result<()> {
    let job = job::resolve(&args.job)?;
    let renderer = build_renderer(&args.shaders, (job.width(), job.height()))?;
    let mut session = Session::new(renderer);

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let stream = Rc::new(RefCell::new(StreamFile {
        writer: BufWriter::new(file),
        bytes: 0,
        error: None,
    }));

    let sink_stream = Rc::clone(&stream);
    let callbacks = SinkCallbacks::new().on_output(move |chunk| {
        let mut stream = sink_stream.borrow_mut();
        if stream.error.is_some() {
            return;
        }
        match stream.writer.write_all(&chunk.data) {
            Ok(()) => stream.bytes += chunk.data.len() as u64,
            Err(err) => {
                tracing::error!(%err, "failed to write encoded output");
                stream.error = Some(err);
            }
        }
    });
    let mut sink = FfmpegSink::new(&args.ffmpeg, callbacks);

    let summary = encode_in_session(&mut session, &job, &mut sink)?;
    drop(sink);

    let mut stream = stream.borrow_mut();
    if let Some(err) = stream.error.take() {
        return Err::<(), _>(err)
            .with_context(|| format!("failed to write {}", args.output.display()));
    }
    stream
        .writer
        .flush()
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(
        frames = summary.frames,
        bytes = stream.bytes,
        output = %args.output.display(),
        "wrote {}",
        job.codec()
    );
    Ok(())
}

fn play(args: PlayArgs) -> Result<()> {
    if !(args.refresh_hz.is_finite() && args.refresh_hz > 0.0) {
        bail!("refresh rate must be a positive number");
    }
    if !(args.seconds.is_finite() && args.seconds >= 0.0) {
        bail!("play duration must be a non-negative number");
    }
    let Ok(refresh) = Duration::try_from_secs_f64(1.0 / args.refresh_hz) else {
        bail!("refresh rate {} Hz is too low", args.refresh_hz);
    };
    let Ok(length) = Duration::try_from_secs_f64(args.seconds) else {
        bail!("play duration of {} seconds is too long", args.seconds);
    };

    let renderer = build_renderer(&args.shaders, args.size)?;
    let mut session = Session::new(renderer);

    session.play()?;
    let started = Instant::now();
    let mut drawn = 0;
    while started.elapsed() < length {
        let tick = Instant::now();
        drawn += session.tick();
        if let Some(rest) = refresh.checked_sub(tick.elapsed()) {
            thread::sleep(rest);
        }
    }
    session.stop()?;

    let elapsed = started.elapsed().as_secs_f64();
    tracing::info!(
        frames = drawn,
        fps = format_args!("{:.1}", drawn as f64 / elapsed.max(f64::EPSILON)),
        "playback finished"
    );

    if let Some(path) = &args.snapshot {
        session.exclusive()?.snapshot(path)?;
    }
    session.leave();
    Ok(())
}

#[derive(Serialize)]
struct PlanReport<'a> {
    job: &'a EncodeJob,
    total_frames: f64,
    frame_interval: f64,
    frames: Vec<PlannedFrame>,
}

#[derive(Serialize)]
struct PlannedFrame {
    index: u64,
    time: f64,
    duration: f64,
}

fn plan(args: PlanArgs) -> Result<()> {
    let job = job::resolve(&args.job)?;
    let schedule = FrameSchedule::new(&job);
    let report = PlanReport {
        job: &job,
        total_frames: schedule.total_frames(),
        frame_interval: schedule.interval(),
        frames: schedule
            .map(|plan| PlannedFrame {
                index: plan.index,
                time: plan.time,
                duration: plan.duration,
            })
            .collect(),
    };
    let rendered = serde_json::to_string_pretty(&report)?;
    println!("{rendered}");
    Ok(())
}
