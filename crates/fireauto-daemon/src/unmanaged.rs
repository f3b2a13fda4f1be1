//! Unmanaged supervision: a detached process tracked by a PID file.
//!
//! Used on hosts without systemd. Nothing is registered with the host;
//! the PID file is the only record of the running service and every
//! query re-probes it.

use std::fs::{self, OpenOptions};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use async_trait::async_trait;
use fireauto_config::{Settings, SupervisionSettings};
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::{Pid, User, geteuid};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::descriptor::ServiceDescriptor;
use crate::error::DaemonError;
use crate::pid::{PidFile, PidState};
use crate::runner::CommandRunner;
use crate::supervisor::{Outcome, StatusReport, SupervisionKind, Supervisor};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const KILL_GRACE: Duration = Duration::from_secs(2);
const LOG_TAIL_LINES: usize = 20;

/// A process started by [`UnmanagedSupervisor::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    pub log_path: PathBuf,
    pub pid_file_path: PathBuf,
}

/// Supervises the service as a detached child recorded in a PID file.
pub struct UnmanagedSupervisor {
    descriptor: ServiceDescriptor,
    pid_file: PidFile,
    log_file: PathBuf,
    timing: SupervisionSettings,
    runner: Arc<dyn CommandRunner>,
}

impl UnmanagedSupervisor {
    pub fn new(
        descriptor: ServiceDescriptor,
        pid_file: PathBuf,
        log_file: PathBuf,
        timing: SupervisionSettings,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            descriptor,
            pid_file: PidFile::new(pid_file),
            log_file,
            timing,
            runner,
        }
    }

    pub fn from_settings(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(
            ServiceDescriptor::from_settings(settings),
            settings.paths.pid_file.clone(),
            settings.paths.log_file.clone(),
            settings.supervision.clone(),
            runner,
        )
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// Launch the entry command and record its PID. Caller holds the lock.
    async fn spawn(&self) -> Result<ProcessHandle, DaemonError> {
        if let Some(parent) = self.log_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;
        let log_err = log.try_clone()?;

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(format!("exec {}", self.descriptor.entry_command))
            .current_dir(&self.descriptor.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .process_group(0);

        if let Some((uid, gid)) = self.target_identity()? {
            command.uid(uid).gid(gid);
        }

        let child = command.spawn().map_err(|e| DaemonError::Spawn {
            command: self.descriptor.entry_command.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id();
        let exited = reap_in_background(child);

        tokio::time::sleep(self.timing.start_grace()).await;
        if let Ok(status) = exited.try_recv() {
            return Err(DaemonError::Spawn {
                command: self.descriptor.entry_command.clone(),
                reason: format!(
                    "exited during startup ({}); last output:\n{}",
                    describe_status(status),
                    log_tail(&self.log_file, LOG_TAIL_LINES)
                ),
            });
        }

        self.pid_file.write_pid(pid)?;
        info!("Started {} (PID {})", self.descriptor.name, pid);

        Ok(ProcessHandle {
            pid,
            log_path: self.log_file.clone(),
            pid_file_path: self.pid_file.path().to_path_buf(),
        })
    }

    /// uid/gid to drop to, when running as root on behalf of another account.
    fn target_identity(&self) -> Result<Option<(u32, u32)>, DaemonError> {
        let user = self.descriptor.run_as_user.as_str();
        if !geteuid().is_root() || user.is_empty() || user == "root" {
            return Ok(None);
        }

        match User::from_name(user) {
            Ok(Some(account)) => Ok(Some((account.uid.as_raw(), account.gid.as_raw()))),
            Ok(None) => Err(DaemonError::Environment(format!(
                "User '{}' does not exist on this host",
                user
            ))),
            Err(e) => Err(DaemonError::Environment(format!(
                "Failed to look up user '{}': {}",
                user, e
            ))),
        }
    }

    /// SIGTERM the process group, escalating to SIGKILL. Caller holds the lock.
    async fn terminate(&self, pid: u32) -> Result<(), DaemonError> {
        info!("Stopping {} (PID {})", self.descriptor.name, pid);
        send_signal(pid, Signal::SIGTERM);

        if wait_for_exit(pid, self.timing.stop_timeout()).await {
            return Ok(());
        }

        warn!(
            "PID {} still running after {}s, sending SIGKILL",
            pid, self.timing.stop_timeout_secs
        );
        send_signal(pid, Signal::SIGKILL);

        if wait_for_exit(pid, KILL_GRACE).await {
            Ok(())
        } else {
            Err(DaemonError::StopTimeout { pid })
        }
    }

    async fn stop_locked(&self) -> Result<Outcome, DaemonError> {
        let Some(pid) = self.pid_file.clear_stale()? else {
            return Ok(Outcome::NotRunning);
        };

        self.terminate(pid).await?;
        self.pid_file.remove()?;
        info!("Stopped {}", self.descriptor.name);
        Ok(Outcome::Stopped)
    }

    async fn start_locked(&self) -> Result<Outcome, DaemonError> {
        if let Some(pid) = self.pid_file.clear_stale()? {
            return Ok(Outcome::AlreadyRunning { pid: Some(pid) });
        }

        let handle = self.spawn().await?;
        Ok(Outcome::Started {
            pid: Some(handle.pid),
        })
    }
}

/// Wait on the child from a plain thread so it never lingers as a zombie.
fn reap_in_background(mut child: std::process::Child) -> Receiver<ExitStatus> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        if let Ok(status) = child.wait() {
            let _ = tx.send(status);
        }
    });
    rx
}

fn send_signal(pid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    // The child leads its own process group; fall back for foreign PIDs.
    if killpg(Pid::from_raw(raw), signal).is_err() {
        if let Err(e) = kill(Pid::from_raw(raw), signal) {
            debug!("Failed to send {} to {}: {}", signal, pid, e);
        }
    }
}

async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !PidFile::is_process_running(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
}

fn describe_status(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit code {}", code),
        (None, Some(sig)) => format!("signal {}", sig),
        _ => "unknown status".to_string(),
    }
}

fn log_tail(path: &Path, lines: usize) -> String {
    let Ok(contents) = fs::read_to_string(path) else {
        return String::new();
    };
    let all: Vec<&str> = contents.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[async_trait]
impl Supervisor for UnmanagedSupervisor {
    fn kind(&self) -> SupervisionKind {
        SupervisionKind::Unmanaged
    }

    async fn start(&self) -> Result<Outcome, DaemonError> {
        let _lock = self.pid_file.lock()?;
        self.start_locked().await
    }

    async fn stop(&self) -> Result<Outcome, DaemonError> {
        let _lock = self.pid_file.lock()?;
        self.stop_locked().await
    }

    async fn restart(&self) -> Result<Outcome, DaemonError> {
        let _lock = self.pid_file.lock()?;

        if self.stop_locked().await? == Outcome::Stopped {
            tokio::time::sleep(self.timing.settle_delay()).await;
        }

        let handle = self.spawn().await?;
        Ok(Outcome::Restarted {
            pid: Some(handle.pid),
        })
    }

    async fn status(&self) -> Result<StatusReport, DaemonError> {
        let (running, pid, detail) = match self.pid_file.probe()? {
            PidState::Live(pid) => (true, Some(pid), format!("Running (PID {})", pid)),
            PidState::Absent => (false, None, "Not running".to_string()),
            PidState::Stale(Some(pid)) => (
                false,
                None,
                format!("Not running (stale PID file for {})", pid),
            ),
            PidState::Stale(None) => (false, None, "Not running (unreadable PID file)".to_string()),
        };

        Ok(StatusReport {
            kind: SupervisionKind::Unmanaged,
            running,
            pid,
            detail,
        })
    }

    async fn logs(&self) -> Result<Outcome, DaemonError> {
        if !self.log_file.exists() {
            return Ok(Outcome::NoLogs {
                path: self.log_file.clone(),
            });
        }

        let path = self.log_file.to_string_lossy();
        let code = self
            .runner
            .attach("tail", &["-n", "50", "-F", path.as_ref()])
            .await?;
        if code != 0 {
            return Err(DaemonError::Supervision {
                tool: "tail".to_string(),
                code,
                message: format!("following {} failed", path),
            });
        }
        Ok(Outcome::LogsClosed)
    }

    async fn enable(&self) -> Result<Outcome, DaemonError> {
        Ok(Outcome::Unsupported { action: "enable" })
    }

    async fn disable(&self) -> Result<Outcome, DaemonError> {
        Ok(Outcome::Unsupported { action: "disable" })
    }
}

#[cfg(test)]
#[path = "unmanaged_tests.rs"]
mod tests;
