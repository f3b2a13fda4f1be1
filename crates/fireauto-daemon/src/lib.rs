//! # fireauto Daemon
//!
//! Supervision of the 24Fire automation service on hosts with or without
//! a native service manager.
//!
//! ## Features
//!
//! - Host capability detection (OS family, systemd availability)
//! - Managed supervision through systemd (`systemctl`, `journalctl`)
//! - Unmanaged supervision through a detached process and a PID file
//! - A lifecycle controller that maps operator verbs onto either strategy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fireauto_daemon::{Controller, Verb};
//!
//! let controller = Controller::from_host(settings, interactive);
//! let report = controller.dispatch(Verb::Status).await?;
//! ```
//!
//! The strategy is re-derived from [`HostProfile`] on every invocation, so
//! a host that gains systemd after installation switches to managed
//! supervision without any stored state.

pub mod controller;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod pid;
pub mod runner;
pub mod supervisor;
pub mod systemd;
pub mod unmanaged;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use controller::{ControlReport, Controller, Verb};
pub use descriptor::ServiceDescriptor;
pub use error::DaemonError;
pub use host::{HostProbe, HostProfile, OsFamily};
pub use pid::{PidFile, PidState};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use supervisor::{
    Outcome, StatusReport, SupervisionKind, Supervisor, select_supervisor, supervision_kind,
};
pub use systemd::SystemdSupervisor;
pub use unmanaged::{ProcessHandle, UnmanagedSupervisor};
