//! Supervision-related errors.

use std::path::PathBuf;

use fireauto_config::ConfigError;
use thiserror::Error;

/// Errors that can occur while detecting the host or supervising the service.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Host cannot run the requested operation (unknown user, missing privilege).
    #[error("Environment error: {0}")]
    Environment(String),

    /// A native tool ran and reported failure.
    #[error("{tool} failed with exit code {code}: {message}")]
    Supervision {
        tool: String,
        code: i32,
        message: String,
    },

    /// A process could not be launched at all.
    #[error("Failed to spawn `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    /// Managed service did not report `active` in time.
    #[error("Service {name} did not become active within {secs}s (state: {state})")]
    NotActive {
        name: String,
        secs: u64,
        state: String,
    },

    /// Process survived SIGTERM and SIGKILL.
    #[error("Process {pid} did not exit after SIGKILL")]
    StopTimeout { pid: u32 },

    /// Failed to create or lock the PID file.
    #[error("Failed to create PID file at {path}: {reason}")]
    PidFileCreation { path: PathBuf, reason: String },

    /// Failed to read PID file.
    #[error("Failed to read PID file at {path}: {reason}")]
    PidFileRead { path: PathBuf, reason: String },

    /// Failed to remove PID file.
    #[error("Failed to remove PID file at {path}: {reason}")]
    PidFileRemoval { path: PathBuf, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DaemonError {
    /// Process exit status the controller should terminate with.
    ///
    /// A failed native tool call mirrors that tool's exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Supervision { code, .. } if *code > 0 => *code,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervision_error_display() {
        let err = DaemonError::Supervision {
            tool: "systemctl start fireauto".to_string(),
            code: 5,
            message: "Unit fireauto.service not found.".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("systemctl start fireauto"));
        assert!(msg.contains("exit code 5"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_exit_code_mirrors_tool() {
        let err = DaemonError::Supervision {
            tool: "systemctl".to_string(),
            code: 3,
            message: String::new(),
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_without_tool_status() {
        let err = DaemonError::Supervision {
            tool: "journalctl".to_string(),
            code: -1,
            message: "terminated by signal".to_string(),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(DaemonError::StopTimeout { pid: 42 }.exit_code(), 1);
        assert_eq!(DaemonError::Environment("x".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_not_active_display() {
        let err = DaemonError::NotActive {
            name: "fireauto".to_string(),
            secs: 15,
            state: "failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("15s"));
        assert!(msg.contains("failed"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let daemon_err: DaemonError = io_err.into();
        assert!(daemon_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: DaemonError = ConfigError::NotFound("config.json".to_string()).into();
        assert!(err.to_string().contains("config.json"));
    }
}
