//! Subprocess execution with timeouts and bounded output capture.
//!
//! Every external tool the pipeline drives (package installer, site builder,
//! storage sync utility) is spawned through the [`CommandRunner`] trait. The
//! production implementation is [`ProcessRunner`]; tests substitute their own.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Default ceiling for captured stdout/stderr, per stream (10 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Prepended to a stream whose head was dropped to stay under the ceiling.
const TRUNCATION_MARKER: &str = "[... earlier output truncated ...]\n";

/// Errors that prevent a command from producing an exit status.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran longer than its timeout and was killed.
    ///
    /// `partial` holds whatever the child wrote before it was killed.
    #[error("'{program}' timed out after {timeout:?}")]
    Timeout {
        program: String,
        timeout: Duration,
        partial: CommandOutput,
    },

    /// Reading output or waiting on the child failed.
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// Output captured before the failure, empty when there was none.
    pub fn diagnostics(&self) -> String {
        match self {
            CommandError::Timeout { partial, .. } => partial.diagnostics(),
            _ => String::new(),
        }
    }
}

/// A fully described subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute (resolved through `PATH`).
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Hard wall-clock limit.
    pub timeout: Duration,
    /// Per-stream capture ceiling in bytes.
    pub max_output_bytes: usize,
}

impl CommandSpec {
    /// Creates a spec for `program` with no arguments and a 60 second timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            timeout: Duration::from_secs(60),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the capture ceiling.
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, or -1 when the child was terminated by a signal.
    pub exit_code: i32,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Whether either stream exceeded the capture ceiling.
    pub truncated: bool,
}

impl CommandOutput {
    /// Creates an output with the given exit code and streams.
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
            truncated: false,
        }
    }

    /// Returns true if the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Combined stdout and stderr, for error reports.
    pub fn diagnostics(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n--- stderr ---\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion, honoring its timeout.
    ///
    /// A non-zero exit is *not* an error at this level; callers inspect
    /// [`CommandOutput::exit_code`].
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// [`CommandRunner`] backed by `tokio::process`.
///
/// Children are spawned with `kill_on_drop`, so cancelling the returned
/// future or hitting the timeout terminates the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let start = Instant::now();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        debug!(command = %spec, timeout = ?spec.timeout, "Spawning command");

        let mut child = cmd.spawn().map_err(|e| CommandError::Spawn {
            program: spec.program.clone(),
            source: e,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let cap = spec.max_output_bytes;

        // The buffers outlive `collect` so a timeout keeps what was read.
        let mut out = CapturedStream::default();
        let mut err = CapturedStream::default();

        let collect = async {
            let (status, out_read, err_read) = tokio::join!(
                child.wait(),
                read_capped(stdout, cap, &mut out),
                read_capped(stderr, cap, &mut err)
            );
            out_read?;
            err_read?;
            Ok::<_, std::io::Error>(status?)
        };
        let outcome = tokio::time::timeout(spec.timeout, collect).await;

        match outcome {
            Ok(Ok(status)) => {
                let truncated = out.truncated || err.truncated;
                if truncated {
                    warn!(
                        command = %spec,
                        max_output_bytes = cap,
                        "Command output exceeded capture ceiling; keeping the tail"
                    );
                }
                Ok(CommandOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout: out.into_string(),
                    stderr: err.into_string(),
                    duration: start.elapsed(),
                    truncated,
                })
            }
            Ok(Err(e)) => Err(CommandError::Io {
                program: spec.program.clone(),
                source: e,
            }),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(command = %spec, error = %e, "Failed to kill timed out command");
                }
                out.trim_to(cap);
                err.trim_to(cap);
                let truncated = out.truncated || err.truncated;
                Err(CommandError::Timeout {
                    program: spec.program.clone(),
                    timeout: spec.timeout,
                    partial: CommandOutput {
                        exit_code: -1,
                        stdout: out.into_string(),
                        stderr: err.into_string(),
                        duration: start.elapsed(),
                        truncated,
                    },
                })
            }
        }
    }
}

/// Size of one read from a child stream.
const READ_CHUNK: usize = 8192;

/// One captured output stream.
#[derive(Debug, Default)]
struct CapturedStream {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CapturedStream {
    fn push(&mut self, data: &[u8], cap: usize) {
        self.bytes.extend_from_slice(data);
        // Compact lazily so long outputs do not shift the buffer on every read.
        if self.bytes.len() > cap.saturating_mul(2).max(READ_CHUNK) {
            self.trim_to(cap);
        }
    }

    /// Drops the head of the buffer so at most `cap` bytes remain.
    fn trim_to(&mut self, cap: usize) {
        if self.bytes.len() > cap {
            let excess = self.bytes.len() - cap;
            self.bytes.drain(..excess);
            self.truncated = true;
        }
    }

    fn into_string(self) -> String {
        let text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            format!("{}{}", TRUNCATION_MARKER, text)
        } else {
            text
        }
    }
}

/// Reads a stream to EOF into `sink`, keeping at most the last `cap` bytes.
///
/// Every chunk lands in `sink` as soon as it is read, so dropping this
/// future part-way loses nothing already received.
async fn read_capped<R: AsyncRead + Unpin>(
    reader: Option<R>,
    cap: usize,
    sink: &mut CapturedStream,
) -> std::io::Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        sink.push(&chunk[..n], cap);
    }

    sink.trim_to(cap);
    Ok(())
}
