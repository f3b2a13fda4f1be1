//! Installer and uninstaller errors.

use fireauto_config::ConfigError;
use fireauto_daemon::DaemonError;
use thiserror::Error;

/// Errors that abort an install or uninstall run.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Host is unsupported or the run lacks a privilege it needs.
    #[error("Environment error: {0}")]
    Environment(String),

    /// Package installation or dependency import failed.
    #[error("Provisioning failed during {step}: {message}")]
    Provisioning { step: String, message: String },

    /// Supervision error.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operator input ended before a prompt was answered.
    #[error("Aborted: {0}")]
    Aborted(String),
}

impl SetupError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::Daemon(e) => e.exit_code(),
            _ => 1,
        }
    }
}
