//! Execution of native tools (systemctl, journalctl, tail, editors).

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::DaemonError;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Build an output with the given code and stdout, for fakes.
    pub fn with_code(code: i32, stdout: impl Into<String>) -> Self {
        Self {
            code,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Convert a non-zero exit into a supervision error carrying stderr.
    pub fn into_result(self, tool: impl Into<String>) -> Result<Self, DaemonError> {
        if self.success() {
            return Ok(self);
        }
        let message = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        Err(DaemonError::Supervision {
            tool: tool.into(),
            code: self.code,
            message,
        })
    }
}

/// Seam between supervision logic and the processes it launches.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing stdout and stderr.
    async fn capture(&self, program: &str, args: &[&str]) -> Result<CommandOutput, DaemonError>;

    /// Run with the terminal attached until it exits or the operator interrupts.
    ///
    /// An interrupt ends the command and counts as a clean exit.
    async fn attach(&self, program: &str, args: &[&str]) -> Result<i32, DaemonError>;
}

/// Runs commands on the real host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

fn spawn_error(program: &str, args: &[&str], e: std::io::Error) -> DaemonError {
    DaemonError::Spawn {
        command: std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" "),
        reason: e.to_string(),
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn capture(&self, program: &str, args: &[&str]) -> Result<CommandOutput, DaemonError> {
        debug!("Running {} {:?}", program, args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(program, args, e))?;

        Ok(CommandOutput {
            code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn attach(&self, program: &str, args: &[&str]) -> Result<i32, DaemonError> {
        debug!("Attaching {} {:?}", program, args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, args, e))?;

        tokio::select! {
            status = child.wait() => Ok(exit_code(status?)),
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, stopping {}", program);
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(0)
            }
        }
    }
}
