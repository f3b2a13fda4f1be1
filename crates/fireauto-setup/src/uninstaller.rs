//! The uninstall flow.
//!
//! Every step logs its failures and moves on. Whether the run succeeded
//! is decided at the end by looking at what is still on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fireauto_config::Settings;
use fireauto_daemon::{
    CommandRunner, HostProbe, HostProfile, Outcome, SupervisionKind, Supervisor, SystemRunner,
    SystemdSupervisor, UnmanagedSupervisor, select_supervisor,
};
use tracing::{info, warn};

use crate::artifacts::InstalledArtifactSet;
use crate::error::SetupError;
use crate::prompt::Prompter;
use crate::provision::PackageManager;

#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOptions {
    /// Do not ask for confirmation.
    pub assume_yes: bool,
}

/// What an uninstall run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    /// The operator declined; nothing was touched.
    pub declined: bool,
    pub removed: Vec<PathBuf>,
    pub already_absent: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    /// Artifacts still present after the run.
    pub remaining: Vec<PathBuf>,
    /// Commands the operator may run to remove dependencies.
    pub guidance: Vec<String>,
}

impl UninstallReport {
    /// 1 when some artifact survived the run, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.remaining.is_empty() { 0 } else { 1 }
    }

    pub fn lines(&self) -> Vec<String> {
        if self.declined {
            return vec!["Uninstall cancelled".to_string()];
        }

        let mut lines: Vec<String> = self
            .removed
            .iter()
            .map(|p| format!("Removed {}", p.display()))
            .collect();
        for (path, reason) in &self.failed {
            lines.push(format!("Failed to remove {}: {}", path.display(), reason));
        }
        if self.remaining.is_empty() {
            lines.push("Uninstall complete".to_string());
        } else {
            lines.push("Some files could not be removed:".to_string());
            lines.extend(self.remaining.iter().map(|p| format!("  {}", p.display())));
        }
        lines.extend(self.guidance.iter().cloned());
        lines
    }

    fn note(&mut self, path: &Path, result: Result<bool, std::io::Error>) {
        match result {
            Ok(true) => {
                info!("Removed {}", path.display());
                self.removed.push(path.to_path_buf());
            }
            Ok(false) => self.already_absent.push(path.to_path_buf()),
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                self.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }
}

/// Removes everything an install created.
pub struct Uninstaller {
    probe: HostProbe,
    profile: HostProfile,
    settings: Settings,
    runner: Arc<dyn CommandRunner>,
    prompter: Box<dyn Prompter>,
    options: UninstallOptions,
}

impl Uninstaller {
    pub fn new(
        probe: HostProbe,
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        prompter: Box<dyn Prompter>,
        options: UninstallOptions,
    ) -> Self {
        let profile = HostProfile::detect_with(&probe);
        Self {
            probe,
            profile,
            settings,
            runner,
            prompter,
            options,
        }
    }

    pub fn from_host(
        settings: Settings,
        prompter: Box<dyn Prompter>,
        options: UninstallOptions,
    ) -> Self {
        Self::new(
            HostProbe::system(),
            settings,
            Arc::new(SystemRunner),
            prompter,
            options,
        )
    }

    pub fn artifacts(&self) -> InstalledArtifactSet {
        InstalledArtifactSet::from_settings(&self.settings)
    }

    pub async fn run(&mut self) -> Result<UninstallReport, SetupError> {
        let mut report = UninstallReport::default();
        let artifacts = self.artifacts();

        if self.prompter.is_interactive() && !self.options.assume_yes {
            let question = format!(
                "Remove {} and all of its files from this host?",
                self.settings.service.name
            );
            if !self.prompter.confirm(&question, false)? {
                report.declined = true;
                return Ok(report);
            }
        }

        self.stop_and_disable().await;
        self.remove_registration(&artifacts, &mut report).await;

        report.note(&artifacts.controller, remove_path(&artifacts.controller));
        report.note(&artifacts.app_dir, remove_path(&artifacts.app_dir));
        report.note(&artifacts.log_dir, remove_path(&artifacts.log_dir));

        for temp in [&artifacts.pid_file, &artifacts.pid_lock, &artifacts.log_file] {
            report.note(temp, remove_path(temp));
        }

        report.note(&artifacts.settings_file, remove_path(&artifacts.settings_file));
        if let Some(parent) = artifacts.settings_file.parent() {
            // Only succeeds when nothing else lives there.
            if fs::remove_dir(parent).is_ok() {
                info!("Removed {}", parent.display());
            }
        }

        if self.prompter.is_interactive() {
            report.guidance = self.dependency_guidance();
        }

        report.remaining = artifacts.existing();
        Ok(report)
    }

    async fn stop_and_disable(&self) {
        let supervisor = select_supervisor(&self.profile, &self.settings, self.runner.clone());

        match supervisor.stop().await {
            Ok(Outcome::Stopped) => info!("Stopped {}", self.settings.service.name),
            Ok(_) => {}
            Err(e) => warn!("Failed to stop {}: {}", self.settings.service.name, e),
        }

        if supervisor.kind() == SupervisionKind::Managed {
            if let Err(e) = supervisor.disable().await {
                warn!("Failed to disable {}: {}", self.settings.service.name, e);
            }
            self.stop_detached().await;
        }
    }

    /// Stop a process started before systemd appeared on this host. Its PID
    /// file is the only record of it and is about to be removed.
    async fn stop_detached(&self) {
        let detached = UnmanagedSupervisor::from_settings(&self.settings, self.runner.clone());
        if !detached.pid_file().exists() {
            return;
        }

        match detached.stop().await {
            Ok(Outcome::Stopped) => info!(
                "Stopped detached {} process from {}",
                self.settings.service.name,
                detached.pid_file().path().display()
            ),
            Ok(_) => {}
            Err(e) => warn!(
                "Failed to stop detached {} process: {}",
                self.settings.service.name, e
            ),
        }
    }

    /// Remove the unit file whenever it exists, whatever the current strategy.
    async fn remove_registration(
        &self,
        artifacts: &InstalledArtifactSet,
        report: &mut UninstallReport,
    ) {
        let unit = &artifacts.unit_file;
        if self.probe.find_program("systemctl").is_none() {
            report.note(unit, remove_path(unit));
            return;
        }

        let systemd = SystemdSupervisor::from_settings(&self.settings, self.runner.clone());
        match systemd.uninstall().await {
            Ok(removed) => report.note(unit, Ok(removed)),
            Err(e) => {
                warn!("Failed to unregister {}: {}", self.settings.service.name, e);
                report.note(unit, remove_path(unit));
            }
        }
    }

    fn dependency_guidance(&self) -> Vec<String> {
        let provision = &self.settings.provision;
        let mut lines = vec![
            String::new(),
            "Dependencies were left installed because other software may use them.".to_string(),
            "To remove them yourself:".to_string(),
        ];
        if !provision.python_packages.is_empty() {
            lines.push(format!(
                "  {} -m pip uninstall {}",
                provision.python,
                provision.python_packages.join(" ")
            ));
        }
        if !provision.system_packages.is_empty() {
            if let Some(manager) = PackageManager::detect(self.profile.os_family, &self.probe) {
                lines.push(format!("  {}", manager.removal_hint(&provision.system_packages)));
            }
        }
        lines
    }
}

/// Remove a file, link or directory tree. `Ok(false)` when already gone.
fn remove_path(path: &Path) -> Result<bool, std::io::Error> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "uninstaller_tests.rs"]
mod tests;
