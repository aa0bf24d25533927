//! Command executor - runs external tools with a deadline.
//!
//! Tool failures are data, not errors: [`Executor::execute`] always returns
//! an [`ExecOutcome`], with a sentinel status for timeouts and spawn
//! failures. Stages inspect the outcome and carry on.

use crate::error::ExecError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Exit code reported for commands that never produced one.
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// Stderr marker of a command killed by its deadline.
pub const TIMEOUT_MARKER: &str = "TIMEOUT";

const STDERR_LOG_LIMIT: usize = 200;

/// Description of a single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Data piped to the child's stdin, if any.
    pub stdin: Option<String>,
    pub timeout: Duration,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a command with the default five-minute deadline.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            timeout: Duration::from_secs(300),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value` only when `value` is present.
    pub fn opt_arg(self, flag: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.arg(flag).arg(v),
            None => self,
        }
    }

    /// Feed newline-joined lines to stdin.
    pub fn stdin_lines<S: AsRef<str>>(mut self, lines: &[S]) -> Self {
        let mut input = lines
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");
        input.push('\n');
        self.stdin = Some(input);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    /// Exited with a nonzero code.
    Failed,
    /// Killed after exceeding its deadline.
    TimedOut,
    /// Could not be started or awaited.
    SpawnFailed,
}

/// Captured result of a command. Always produced, even on failure.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub status: ExecStatus,
    timeout: Duration,
}

impl ExecOutcome {
    /// Outcome of a command that ran to completion.
    pub fn completed(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration,
            status: if exit_code == 0 {
                ExecStatus::Success
            } else {
                ExecStatus::Failed
            },
            timeout: Duration::ZERO,
        }
    }

    /// Sentinel for a command killed by its deadline.
    pub fn timed_out(command: impl Into<String>, timeout: Duration, duration: Duration) -> Self {
        Self {
            command: command.into(),
            exit_code: SENTINEL_EXIT_CODE,
            stdout: String::new(),
            stderr: TIMEOUT_MARKER.to_string(),
            duration,
            status: ExecStatus::TimedOut,
            timeout,
        }
    }

    /// Sentinel for a command that could not be started.
    pub fn spawn_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            exit_code: SENTINEL_EXIT_CODE,
            stdout: String::new(),
            stderr: reason.into(),
            duration: Duration::ZERO,
            status: ExecStatus::SpawnFailed,
            timeout: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ExecStatus::Success
    }

    pub fn is_timeout(&self) -> bool {
        self.status == ExecStatus::TimedOut
    }

    /// Non-empty, trimmed stdout lines.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Typed error for anything other than a clean exit.
    pub fn error(&self) -> Option<ExecError> {
        match self.status {
            ExecStatus::Success => None,
            ExecStatus::Failed => Some(ExecError::Failure {
                command: self.command.clone(),
                code: self.exit_code,
                stderr: truncate(&self.stderr, STDERR_LOG_LIMIT),
            }),
            ExecStatus::TimedOut => Some(ExecError::Timeout {
                command: self.command.clone(),
                timeout: self.timeout,
            }),
            ExecStatus::SpawnFailed => Some(ExecError::Spawn {
                command: self.command.clone(),
                reason: self.stderr.clone(),
            }),
        }
    }
}

/// Runs external commands.
///
/// Implementations must never panic or return early on tool failure.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one command to completion or until its deadline.
    async fn execute(&self, spec: CommandSpec) -> ExecOutcome;

    /// Run commands through a pool of at most `max_concurrency` workers.
    ///
    /// Results come back in completion order. Returns once every command has
    /// finished or hit its own deadline; a slow command never cancels others.
    async fn execute_parallel(
        &self,
        specs: Vec<CommandSpec>,
        max_concurrency: usize,
    ) -> Vec<ExecOutcome> {
        stream::iter(specs)
            .map(|spec| self.execute(spec))
            .buffer_unordered(max_concurrency.max(1))
            .collect()
            .await
    }
}

/// Executor backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, spec: CommandSpec) -> ExecOutcome {
        let command = spec.to_string();
        let started = Instant::now();
        info!(command = %command, "CMD");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(command = %command, error = %e, "failed to spawn");
                return ExecOutcome::spawn_failed(command, e.to_string());
            }
        };

        // Write stdin from its own task so a chatty child cannot deadlock us.
        if let (Some(input), Some(mut pipe)) = (spec.stdin, child.stdin.take()) {
            tokio::spawn(async move {
                let _ = pipe.write_all(input.as_bytes()).await;
                let _ = pipe.shutdown().await;
            });
        }

        match timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(SENTINEL_EXIT_CODE);
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if exit_code != 0 && !stderr.trim().is_empty() {
                    warn!(
                        command = %command,
                        exit_code,
                        stderr = %truncate(&stderr, STDERR_LOG_LIMIT),
                        "STDERR"
                    );
                }
                ExecOutcome::completed(
                    command,
                    exit_code,
                    String::from_utf8_lossy(&output.stdout),
                    stderr,
                    started.elapsed(),
                )
            }
            Ok(Err(e)) => {
                error!(command = %command, error = %e, "failed to collect output");
                ExecOutcome::spawn_failed(command, e.to_string())
            }
            Err(_) => {
                error!(
                    command = %command,
                    timeout_secs = spec.timeout.as_secs(),
                    "TIMEOUT"
                );
                ExecOutcome::timed_out(command, spec.timeout, started.elapsed())
            }
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
