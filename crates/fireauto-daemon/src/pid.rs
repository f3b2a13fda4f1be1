//! PID file management for the unmanaged service process.
//!
//! The PID file is the only durable record of an unmanaged process.
//! Liveness is always re-probed; nothing about the process is cached.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::error::DaemonError;

/// What the PID file says about the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidState {
    /// No PID file.
    Absent,
    /// PID file names a live process.
    Live(u32),
    /// PID file names a dead process, or holds garbage.
    Stale(Option<u32>),
}

/// PID file at a well-known location.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

/// Exclusive advisory lock serializing check-then-act sequences on a PID file.
#[derive(Debug)]
pub struct PidLock {
    _guard: Flock<File>,
}

impl PidFile {
    /// Create a new PID file handle.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the PID file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the companion lock file.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Check if a PID file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the PID from the file.
    pub fn read_pid(&self) -> Result<Option<u32>, DaemonError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DaemonError::PidFileRead {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let pid = contents
            .trim()
            .parse::<u32>()
            .map_err(|e| DaemonError::PidFileRead {
                path: self.path.clone(),
                reason: format!("Invalid PID format: {}", e),
            })?;

        Ok(Some(pid))
    }

    /// Classify the PID file without modifying it.
    pub fn probe(&self) -> Result<PidState, DaemonError> {
        match self.read_pid() {
            Ok(None) => Ok(PidState::Absent),
            Ok(Some(pid)) if Self::is_process_running(pid) => Ok(PidState::Live(pid)),
            Ok(Some(pid)) => Ok(PidState::Stale(Some(pid))),
            Err(DaemonError::PidFileRead { reason, .. }) if reason.starts_with("Invalid PID") => {
                Ok(PidState::Stale(None))
            }
            Err(e) => Err(e),
        }
    }

    /// Discard a stale PID file, returning the live PID if there is one.
    pub fn clear_stale(&self) -> Result<Option<u32>, DaemonError> {
        match self.probe()? {
            PidState::Absent => Ok(None),
            PidState::Live(pid) => Ok(Some(pid)),
            PidState::Stale(pid) => {
                warn!(
                    "Removing stale PID file (PID {} not running): {}",
                    pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()),
                    self.path.display()
                );
                self.remove()?;
                Ok(None)
            }
        }
    }

    /// Write a specific PID value to the file.
    pub fn write_pid(&self, pid: u32) -> Result<(), DaemonError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| DaemonError::PidFileCreation {
                path: self.path.clone(),
                reason: format!("Failed to create parent directory: {}", e),
            })?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| DaemonError::PidFileCreation {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        write!(file, "{}", pid).map_err(|e| DaemonError::PidFileCreation {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        info!("PID file written: {} (PID: {})", self.path.display(), pid);
        Ok(())
    }

    /// Remove the PID file. Absence is success.
    pub fn remove(&self) -> Result<(), DaemonError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("PID file removed: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DaemonError::PidFileRemoval {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Take the exclusive lock, blocking until concurrent holders release it.
    pub fn lock(&self) -> Result<PidLock, DaemonError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| DaemonError::PidFileCreation {
                path: lock_path.clone(),
                reason: e.to_string(),
            })?;

        let guard = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            DaemonError::PidFileCreation {
                path: lock_path.clone(),
                reason: format!("Failed to lock: {}", errno),
            }
        })?;

        Ok(PidLock { _guard: guard })
    }

    /// Check if a process with the given PID is running.
    pub fn is_process_running(pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }

        // Signal 0 only performs the existence and permission checks.
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
#[path = "pid_tests.rs"]
mod tests;
