//! Managed supervision through systemd.
//!
//! This module renders the unit file for the automation service, registers
//! it with systemd and delegates every lifecycle operation to `systemctl`
//! and `journalctl`.

mod systemd_ops;
mod systemd_service;

pub use systemd_service::SystemdSupervisor;

#[cfg(test)]
#[path = "systemd_tests.rs"]
mod tests;
