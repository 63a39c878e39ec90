use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use jobconfig::VideoCodec;
use tracing::{debug, info, warn};

use crate::sink::{EncodedChunk, EncoderConfig, EncoderSink, FrameCheck, SinkCallbacks, VideoFrame};
use crate::EncodeError;

const READ_CHUNK: usize = 64 * 1024;

/// Sink backed by an `ffmpeg` child process.
///
/// Raw RGBA frames go to ffmpeg's stdin; the encoded elementary stream
/// (Annex B H.264, or IVF for VP8/VP9) is read from its stdout on a reader
/// thread and handed to the output callback whenever the sink is called.
/// Once ffmpeg reports an error it is recorded and every later call fails
/// with it.
pub struct FfmpegSink {
    program: PathBuf,
    callbacks: SinkCallbacks,
    state: State,
    failure: Option<String>,
    sequence: u64,
}

enum State {
    Idle,
    Running(Process),
    Closed,
}

struct Process {
    child: Child,
    stdin: Option<ChildStdin>,
    check: FrameCheck,
    events: Receiver<StreamEvent>,
    stdout_reader: Option<JoinHandle<()>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
}

enum StreamEvent {
    Data(Vec<u8>),
    Failed(String),
}

impl FfmpegSink {
    pub fn new(program: impl Into<PathBuf>, callbacks: SinkCallbacks) -> Self {
        Self {
            program: program.into(),
            callbacks,
            state: State::Idle,
            failure: None,
            sequence: 0,
        }
    }

    fn fail(&mut self, message: String) -> EncodeError {
        let err = EncodeError::Encoder(message.clone());
        if self.failure.is_none() {
            self.callbacks.error(&err);
            self.failure = Some(message);
        }
        err
    }

    fn recorded_failure(&self) -> Result<(), EncodeError> {
        match &self.failure {
            Some(message) => Err(EncodeError::Encoder(message.clone())),
            None => Ok(()),
        }
    }

    /// Delivers everything the reader thread has produced so far.
    fn dispatch(&mut self) {
        let State::Running(process) = &self.state else {
            return;
        };
        let events: Vec<StreamEvent> = process.events.try_iter().collect();
        self.deliver(events);
    }

    fn deliver(&mut self, events: Vec<StreamEvent>) {
        for event in events {
            match event {
                StreamEvent::Data(data) => {
                    let chunk = EncodedChunk {
                        sequence: self.sequence,
                        data,
                    };
                    self.sequence += 1;
                    self.callbacks.output(chunk);
                }
                StreamEvent::Failed(message) => {
                    self.fail(message);
                }
            }
        }
    }

    fn spawn(&self, config: &EncoderConfig) -> Result<Process, EncodeError> {
        let args = ffmpeg_args(config);
        debug!(program = %self.program.display(), ?args, "spawning encoder");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EncodeError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(mut stdout), Some(mut stderr)) = (stdin, stdout, stderr) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EncodeError::Encoder(
                "failed to open ffmpeg pipes".to_string(),
            ));
        };

        let (sender, events) = crossbeam_channel::unbounded();
        let stdout_reader = std::thread::spawn(move || read_stream(&mut stdout, &sender));
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Process {
            child,
            stdin: Some(stdin),
            check: FrameCheck::new(config),
            events,
            stdout_reader: Some(stdout_reader),
            stderr_drain: Some(stderr_drain),
        })
    }

    /// Collects the exit status and stderr of an ffmpeg that closed its
    /// stdin early, so the error carries ffmpeg's own diagnostic.
    fn reap_stopped(&mut self) -> String {
        let State::Running(mut process) = std::mem::replace(&mut self.state, State::Idle) else {
            return "ffmpeg stopped accepting frames".to_string();
        };
        drop(process.stdin.take());
        let status = process.child.wait();
        if let Some(reader) = process.stdout_reader.take() {
            if reader.join().is_err() {
                warn!("ffmpeg stdout reader panicked");
            }
        }
        let events: Vec<StreamEvent> = process.events.try_iter().collect();
        self.deliver(events);
        let stderr = join_stderr(&mut process);
        match status {
            Ok(status) => format!(
                "ffmpeg stopped accepting frames and exited with {status}: {}",
                stderr.trim()
            ),
            Err(err) => format!("ffmpeg stopped accepting frames: {err}"),
        }
    }

    fn finish_process(&mut self, mut process: Process) -> Result<(), EncodeError> {
        drop(process.stdin.take());
        let status = process.child.wait();
        if let Some(reader) = process.stdout_reader.take() {
            if reader.join().is_err() {
                warn!("ffmpeg stdout reader panicked");
            }
        }
        let events: Vec<StreamEvent> = process.events.try_iter().collect();
        self.deliver(events);
        let stderr = join_stderr(&mut process);

        let status = match status {
            Ok(status) => status,
            Err(err) => return Err(self.fail(format!("failed to wait for ffmpeg: {err}"))),
        };
        if !status.success() {
            return Err(self.fail(format!("ffmpeg exited with {status}: {}", stderr.trim())));
        }
        self.recorded_failure()
    }
}

impl EncoderSink for FfmpegSink {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncodeError> {
        match self.state {
            State::Idle => {}
            State::Running(_) => return Err(EncodeError::AlreadyConfigured),
            State::Closed => return Err(EncodeError::Closed),
        }
        if config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(EncodeError::Unsupported(format!(
                "{}x{} is not supported; yuv420p output needs even dimensions",
                config.width, config.height
            )));
        }
        let process = self.spawn(config)?;
        info!(
            codec = %config.codec,
            width = config.width,
            height = config.height,
            framerate = config.framerate,
            bitrate = config.bitrate,
            "encoder configured"
        );
        self.failure = None;
        self.sequence = 0;
        self.state = State::Running(process);
        Ok(())
    }

    fn encode(&mut self, frame: VideoFrame) -> Result<(), EncodeError> {
        self.dispatch();
        self.recorded_failure()?;
        let process = match &mut self.state {
            State::Running(process) => process,
            State::Idle => return Err(EncodeError::NotRunning),
            State::Closed => return Err(EncodeError::Closed),
        };
        process.check.accept(&frame)?;
        let Some(stdin) = process.stdin.as_mut() else {
            return Err(EncodeError::NotRunning);
        };
        if let Err(err) = stdin.write_all(frame.image.as_raw()) {
            let message = if err.kind() == ErrorKind::BrokenPipe {
                self.reap_stopped()
            } else {
                format!("failed to write frame {} to ffmpeg: {err}", frame.index)
            };
            return Err(self.fail(message));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Running(process) => self.finish_process(process),
            State::Idle => Err(EncodeError::NotRunning),
            State::Closed => {
                self.state = State::Closed;
                Err(EncodeError::Closed)
            }
        }
    }

    fn close(&mut self) -> Result<(), EncodeError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Running(process) => {
                kill(process);
                Ok(())
            }
            State::Idle => Ok(()),
            State::Closed => Err(EncodeError::Closed),
        }
    }

    fn abort(&mut self) {
        if let State::Running(process) = std::mem::replace(&mut self.state, State::Idle) {
            warn!("aborting encoder; unflushed frames are discarded");
            kill(process);
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let State::Running(process) = std::mem::replace(&mut self.state, State::Closed) {
            kill(process);
        }
    }
}

fn kill(mut process: Process) {
    drop(process.stdin.take());
    let _ = process.child.kill();
    let _ = process.child.wait();
    if let Some(reader) = process.stdout_reader.take() {
        let _ = reader.join();
    }
    let _ = join_stderr(&mut process);
}

fn join_stderr(process: &mut Process) -> String {
    match process.stderr_drain.take().map(JoinHandle::join) {
        Some(Ok(Ok(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
        Some(Ok(Err(err))) => format!("(failed to read ffmpeg stderr: {err})"),
        Some(Err(_)) => "(ffmpeg stderr reader panicked)".to_string(),
        None => String::new(),
    }
}

fn read_stream(stdout: &mut impl Read, sender: &Sender<StreamEvent>) {
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        match stdout.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => {
                if sender.send(StreamEvent::Data(buffer[..read].to_vec())).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = sender.send(StreamEvent::Failed(format!(
                    "failed to read encoded output: {err}"
                )));
                break;
            }
        }
    }
}

/// Command line for encoding raw RGBA frames from stdin to stdout.
pub fn ffmpeg_args(config: &EncoderConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();
    args.push(format!("{}x{}", config.width, config.height));
    args.push("-framerate".into());
    args.push(config.framerate.to_string());
    args.extend(["-i", "pipe:0", "-an", "-c:v"].map(String::from));

    let container = match config.codec {
        VideoCodec::Avc { profile, .. } => {
            args.push("libx264".into());
            args.push("-profile:v".into());
            args.push(profile.name().into());
            if let Some(level) = config.codec.level_name() {
                args.push("-level:v".into());
                args.push(level);
            }
            "h264"
        }
        VideoCodec::Vp8 => {
            args.push("libvpx".into());
            "ivf"
        }
        VideoCodec::Vp9 { profile, .. } => {
            args.push("libvpx-vp9".into());
            args.push("-profile:v".into());
            args.push(profile.to_string());
            "ivf"
        }
    };

    args.push("-b:v".into());
    args.push(config.bitrate.to_string());
    args.extend(["-pix_fmt", "yuv420p", "-f", container, "pipe:1"].map(String::from));
    args
}
