//! Supervision strategy: one interface, a managed and an unmanaged variant.

use std::sync::Arc;

use async_trait::async_trait;
use fireauto_config::Settings;
use tracing::debug;

use crate::error::DaemonError;
use crate::host::HostProfile;
use crate::runner::CommandRunner;
use crate::systemd::SystemdSupervisor;
use crate::unmanaged::UnmanagedSupervisor;

/// Which strategy supervises the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionKind {
    /// Delegated to the native service manager.
    Managed,
    /// Detached process tracked by a PID file.
    Unmanaged,
}

impl std::fmt::Display for SupervisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisionKind::Managed => write!(f, "managed (systemd)"),
            SupervisionKind::Unmanaged => write!(f, "unmanaged (pid file)"),
        }
    }
}

/// Pick the strategy for a host. Depends on nothing but the profile.
pub fn supervision_kind(profile: &HostProfile) -> SupervisionKind {
    if profile.has_native_service_manager {
        SupervisionKind::Managed
    } else {
        SupervisionKind::Unmanaged
    }
}

/// Result of a supervision operation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Started { pid: Option<u32> },
    AlreadyRunning { pid: Option<u32> },
    Stopped,
    NotRunning,
    Restarted { pid: Option<u32> },
    Enabled,
    Disabled,
    /// The host has no equivalent for this operation.
    Unsupported { action: &'static str },
    /// Log following ended (operator interrupt or tool exit).
    LogsClosed,
    /// Nothing has been logged yet.
    NoLogs { path: std::path::PathBuf },
}

/// Snapshot of the service state, re-derived on every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub kind: SupervisionKind,
    pub running: bool,
    pub pid: Option<u32>,
    /// Human-readable detail; for managed services the service manager's own output.
    pub detail: String,
}

/// Operations every strategy provides.
#[async_trait]
pub trait Supervisor: Send + Sync {
    fn kind(&self) -> SupervisionKind;

    async fn start(&self) -> Result<Outcome, DaemonError>;

    async fn stop(&self) -> Result<Outcome, DaemonError>;

    /// Stop, then start. Succeeds only once the new instance is confirmed.
    async fn restart(&self) -> Result<Outcome, DaemonError>;

    async fn status(&self) -> Result<StatusReport, DaemonError>;

    /// Follow the service output until interrupted.
    async fn logs(&self) -> Result<Outcome, DaemonError>;

    /// Start automatically at boot.
    async fn enable(&self) -> Result<Outcome, DaemonError>;

    async fn disable(&self) -> Result<Outcome, DaemonError>;
}

/// Build the strategy for `profile`.
pub fn select_supervisor(
    profile: &HostProfile,
    settings: &Settings,
    runner: Arc<dyn CommandRunner>,
) -> Box<dyn Supervisor> {
    let kind = supervision_kind(profile);
    debug!("Selected {} supervision for {}", kind, settings.service.name);

    match kind {
        SupervisionKind::Managed => Box::new(SystemdSupervisor::from_settings(settings, runner)),
        SupervisionKind::Unmanaged => {
            Box::new(UnmanagedSupervisor::from_settings(settings, runner))
        }
    }
}
