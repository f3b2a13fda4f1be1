//! SystemdSupervisor unit generation and registration methods.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fireauto_config::{RestartPolicy, Settings, SupervisionSettings};

use crate::descriptor::ServiceDescriptor;
use crate::error::DaemonError;
use crate::host::resolve_program;
use crate::runner::CommandRunner;

/// Supervises the service through systemd.
pub struct SystemdSupervisor {
    pub(super) descriptor: ServiceDescriptor,
    pub(super) unit_path: PathBuf,
    pub(super) timing: SupervisionSettings,
    pub(super) runner: Arc<dyn CommandRunner>,
}

impl SystemdSupervisor {
    /// Create a new SystemdSupervisor.
    pub fn new(
        descriptor: ServiceDescriptor,
        unit_path: PathBuf,
        timing: SupervisionSettings,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            descriptor,
            unit_path,
            timing,
            runner,
        }
    }

    pub fn from_settings(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(
            ServiceDescriptor::from_settings(settings),
            settings.unit_path(),
            settings.supervision.clone(),
            runner,
        )
    }

    /// Get the service unit file path.
    pub fn unit_path(&self) -> &Path {
        &self.unit_path
    }

    /// `ExecStart=` value with the program resolved to an absolute path.
    pub fn exec_start(&self) -> String {
        let (program, args) = self.descriptor.program_and_args();
        let program = match resolve_program(program) {
            Some(path) => path.display().to_string(),
            None => format!("/usr/bin/env {}", program),
        };
        if args.is_empty() {
            program
        } else {
            format!("{} {}", program, args)
        }
    }

    /// Generate the systemd unit file content.
    pub fn generate_unit(&self) -> String {
        let d = &self.descriptor;
        let mut unit = String::new();

        // [Unit] section
        unit.push_str("[Unit]\n");
        unit.push_str(&format!("Description={}\n", d.description));
        unit.push_str("After=network-online.target\n");
        unit.push_str("Wants=network-online.target\n");
        unit.push('\n');

        // [Service] section
        unit.push_str("[Service]\n");
        unit.push_str("Type=simple\n");
        unit.push_str(&format!("ExecStart={}\n", self.exec_start()));
        unit.push_str(&format!("WorkingDirectory={}\n", d.working_directory.display()));

        // The per-user manager already runs as its owner.
        if !d.user_mode {
            unit.push_str(&format!("User={}\n", d.run_as_user));
        }

        unit.push_str(&format!("Restart={}\n", d.restart_policy.as_systemd()));
        if d.restart_policy == RestartPolicy::Always {
            unit.push_str(&format!("RestartSec={}\n", d.restart_delay_seconds));
        }

        unit.push_str("Environment=\"PYTHONUNBUFFERED=1\"\n");
        unit.push_str("StandardOutput=journal\n");
        unit.push_str("StandardError=journal\n");
        unit.push_str(&format!("SyslogIdentifier={}\n", d.name));
        unit.push('\n');

        // [Install] section
        unit.push_str("[Install]\n");
        let target = if d.user_mode {
            "default.target"
        } else {
            "multi-user.target"
        };
        unit.push_str(&format!("WantedBy={}\n", target));

        unit
    }

    /// Write the unit file and reload systemd.
    pub async fn install(&self) -> Result<(), DaemonError> {
        if let Some(parent) = self.unit_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.unit_path, self.generate_unit())?;
        tracing::info!("Created systemd unit file at: {}", self.unit_path.display());

        self.daemon_reload().await
    }

    /// Remove the unit file and reload systemd. Absence is success.
    pub async fn uninstall(&self) -> Result<bool, DaemonError> {
        let removed = match fs::remove_file(&self.unit_path) {
            Ok(()) => {
                tracing::info!("Removed systemd unit file: {}", self.unit_path.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        self.daemon_reload().await?;
        Ok(removed)
    }

    /// Check if the unit file is installed.
    pub fn is_installed(&self) -> bool {
        self.unit_path.exists()
    }
}
