//! Command runner: execute one external tool with a bounded timeout.
//!
//! Non-zero exits, timeouts and spawn failures are all folded into a
//! [`CommandResult`]. Nothing in here returns an error.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::commands::CommandLine;

/// Default command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Message placed in `stderr` when a command exceeds its timeout.
pub const TIMEOUT_MESSAGE: &str = "Command timed out";

/// Exit code reported for timeouts, spawn failures and signal deaths.
pub const NO_EXIT_CODE: i32 = -1;

/// Outcome of a single command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(rename = "code", alias = "exit_code")]
    pub exit_code: i32,
}

impl CommandResult {
    /// Result for a command that never produced an exit status.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: message.into(),
            exit_code: NO_EXIT_CODE,
        }
    }

    pub fn timed_out() -> Self {
        Self::failure(TIMEOUT_MESSAGE)
    }

    /// Build from a finished process.
    pub fn from_output(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(NO_EXIT_CODE),
        }
    }

    /// The text a user should see: stdout, or stderr when stdout is empty.
    pub fn output(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Something that can run a [`CommandLine`].
///
/// The production implementation is [`SystemExecutor`]; tests substitute a
/// scripted executor so the operation logic runs without the real tools.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, command: &CommandLine) -> CommandResult;

    /// True when commands are only printed. Operations then skip their own
    /// filesystem side effects too.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Runs commands as child processes of this process.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    timeout: Duration,
}

impl SystemExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl Executor for SystemExecutor {
    async fn run(&self, command: &CommandLine) -> CommandResult {
        run_with_timeout(command, self.timeout).await
    }
}

/// Prints each command instead of running it. Every command succeeds.
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl Executor for DryRunExecutor {
    async fn run(&self, command: &CommandLine) -> CommandResult {
        tracing::info!(command = %command, "dry run");
        CommandResult {
            success: true,
            stdout: format!("[dry-run] {}\n", command),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Execute `command` and wait at most `timeout` for it.
///
/// The child is spawned with `kill_on_drop`, so abandoning the wait (timeout
/// or task cancellation) also terminates the process.
pub async fn run_with_timeout(command: &CommandLine, timeout: Duration) -> CommandResult {
    let start = Instant::now();
    tracing::debug!(command = %command, timeout_secs = timeout.as_secs(), "spawning");

    let mut process = tokio::process::Command::new(command.program());
    process
        .args(command.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let result = match tokio::time::timeout(timeout, process.output()).await {
        Ok(Ok(output)) => CommandResult::from_output(output),
        Ok(Err(e)) => {
            CommandResult::failure(format!("Failed to execute {}: {}", command.program(), e))
        }
        Err(_) => CommandResult::timed_out(),
    };

    tracing::debug!(
        command = %command,
        success = result.success,
        code = result.exit_code,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "finished"
    );
    result
}
