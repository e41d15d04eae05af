//! Process execution for kops commands

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::command::KopsCommand;

/// Captured result of a finished command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status 0
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best description of a failure: stderr, else stdout, else the exit code
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Reasons a command could not run to completion
#[derive(Debug, Error)]
pub enum RunError {
    /// The process could not be started
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The process exceeded its time budget and was killed
    #[error("timed out after {timeout:?}")]
    TimedOut {
        /// Configured timeout
        timeout: Duration,
    },
}

/// Executes kops commands
///
/// Abstracted so the adapter can be tested without spawning processes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion and capture its output
    async fn run(&self, command: &KopsCommand) -> Result<CommandOutput, RunError>;
}

/// Production runner backed by `tokio::process`
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    /// Create a runner that kills any command running longer than `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &KopsCommand) -> Result<CommandOutput, RunError> {
        debug!(operation = %command.operation(), command = %command, "running kops");

        let mut cmd = Command::new(command.program());
        cmd.args(command.arguments())
            .envs(command.environment().iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Dropping the output future on timeout kills the child via kill_on_drop
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                warn!(operation = %command.operation(), timeout = ?self.timeout, "kops timed out");
                RunError::TimedOut {
                    timeout: self.timeout,
                }
            })?
            .map_err(|source| RunError::Spawn {
                program: command.program().display().to_string(),
                source,
            })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            debug!(operation = %command.operation(), stream = "stdout", "{}", line);
        }
        for line in result.stderr.lines().filter(|l| !l.trim().is_empty()) {
            debug!(operation = %command.operation(), stream = "stderr", "{}", line);
        }

        if result.is_success() {
            debug!(operation = %command.operation(), "kops succeeded");
        } else {
            warn!(
                operation = %command.operation(),
                exit_code = ?result.exit_code,
                "kops exited with failure"
            );
        }

        Ok(result)
    }
}
