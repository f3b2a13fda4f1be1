//! The install flow.

use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fireauto_config::{ConfigValidator, ConfigurationRecord, LOG_LEVELS, Settings};
use fireauto_daemon::{
    CommandRunner, HostProbe, HostProfile, OsFamily, Outcome, SupervisionKind, SystemRunner,
    SystemdSupervisor, Verb, select_supervisor, supervision_kind,
};
use nix::unistd::{User, chown, geteuid};
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactStatus;
use crate::error::SetupError;
use crate::prompt::Prompter;
use crate::provision::{PackageManager, Provisioner};

/// Installer stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    DetectHost,
    ProvisionPackages,
    VerifyImports,
    CreateArtifacts,
    RegisterService,
    InstallController,
    Configure,
    EnableAndFinish,
}

impl InstallStage {
    pub const ALL: [InstallStage; 8] = [
        InstallStage::DetectHost,
        InstallStage::ProvisionPackages,
        InstallStage::VerifyImports,
        InstallStage::CreateArtifacts,
        InstallStage::RegisterService,
        InstallStage::InstallController,
        InstallStage::Configure,
        InstallStage::EnableAndFinish,
    ];
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallStage::DetectHost => "detect-host",
            InstallStage::ProvisionPackages => "provision-packages",
            InstallStage::VerifyImports => "verify-imports",
            InstallStage::CreateArtifacts => "create-or-reuse-artifacts",
            InstallStage::RegisterService => "register-service",
            InstallStage::InstallController => "install-controller-entrypoint",
            InstallStage::Configure => "interactive-configure",
            InstallStage::EnableAndFinish => "enable-and-finish",
        };
        f.write_str(name)
    }
}

/// Knobs from the command line.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Leave system and Python packages alone.
    pub skip_packages: bool,
    /// Start the service at the end.
    pub start: bool,
    /// Application files to copy into the app directory.
    pub source_dir: Option<PathBuf>,
    /// Binary installed as the controller; defaults to the running executable.
    pub executable: Option<PathBuf>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            skip_packages: false,
            start: true,
            source_dir: None,
            executable: None,
        }
    }
}

/// What an install run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub kind: SupervisionKind,
    /// Stages that ran, in order.
    pub stages: Vec<InstallStage>,
    /// Stages that had nothing to do under the current options.
    pub skipped: Vec<InstallStage>,
    pub artifacts: Vec<(PathBuf, ArtifactStatus)>,
    /// Results of the final enable and start calls.
    pub outcomes: Vec<Outcome>,
    pub web_url: String,
}

impl InstallReport {
    fn new(kind: SupervisionKind) -> Self {
        Self {
            kind,
            stages: Vec::new(),
            skipped: Vec::new(),
            artifacts: Vec::new(),
            outcomes: Vec::new(),
            web_url: String::new(),
        }
    }

    pub fn status_of(&self, path: &Path) -> Option<ArtifactStatus> {
        self.artifacts
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, status)| *status)
    }

    pub fn created(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|(_, s)| *s == ArtifactStatus::Created)
            .count()
    }

    /// Closing message for the operator.
    pub fn summary(&self, settings: &Settings) -> Vec<String> {
        let controller = settings.paths.controller.display();
        let mut lines = vec![
            format!("{} installed ({})", settings.service.name, self.kind),
            format!("  Configuration: {}", settings.config_path().display()),
            format!("  Web interface: {}", self.web_url),
            format!(
                "  Artifacts: {} created, {} reused",
                self.created(),
                self.artifacts.len() - self.created()
            ),
            String::new(),
            "Control the service with:".to_string(),
        ];
        for verb in Verb::ALL {
            lines.push(format!("  {} {}", controller, verb));
        }
        lines
    }
}

/// Runs the install stages against one host.
pub struct Installer {
    probe: HostProbe,
    profile: HostProfile,
    settings: Settings,
    runner: Arc<dyn CommandRunner>,
    prompter: Box<dyn Prompter>,
    options: InstallOptions,
    privileged: bool,
}

impl Installer {
    pub fn new(
        probe: HostProbe,
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        prompter: Box<dyn Prompter>,
        options: InstallOptions,
    ) -> Self {
        let profile = HostProfile::detect_with(&probe);
        Self {
            probe,
            profile,
            settings,
            runner,
            prompter,
            options,
            privileged: geteuid().is_root(),
        }
    }

    /// Installer for the machine this process runs on.
    pub fn from_host(
        settings: Settings,
        prompter: Box<dyn Prompter>,
        options: InstallOptions,
    ) -> Self {
        Self::new(
            HostProbe::system(),
            settings,
            Arc::new(SystemRunner),
            prompter,
            options,
        )
    }

    /// Override the detected privilege level.
    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn profile(&self) -> &HostProfile {
        &self.profile
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn run(&mut self) -> Result<InstallReport, SetupError> {
        let mut report = InstallReport::new(supervision_kind(&self.profile));

        for (index, stage) in InstallStage::ALL.into_iter().enumerate() {
            info!("[{}/{}] {}", index + 1, InstallStage::ALL.len(), stage);
            let ran = match stage {
                InstallStage::DetectHost => self.detect_host(),
                InstallStage::ProvisionPackages => self.provision_packages().await,
                InstallStage::VerifyImports => self.verify_imports().await,
                InstallStage::CreateArtifacts => self.create_artifacts(&mut report),
                InstallStage::RegisterService => self.register_service(&mut report).await,
                InstallStage::InstallController => self.install_controller(&mut report),
                InstallStage::Configure => self.configure(),
                InstallStage::EnableAndFinish => self.enable_and_finish(&mut report).await,
            }?;

            if ran {
                report.stages.push(stage);
            } else {
                debug!("Skipped {}", stage);
                report.skipped.push(stage);
            }
        }

        report.web_url = match ConfigurationRecord::load(&self.settings.config_path()) {
            Ok(record) => record.web_url(),
            Err(_) => ConfigurationRecord::default().web_url(),
        };
        Ok(report)
    }

    fn detect_host(&self) -> Result<bool, SetupError> {
        info!(
            "Host: {}, supervision {}",
            self.profile.os_family,
            supervision_kind(&self.profile)
        );

        for warning in ConfigValidator::validate(&self.settings).into_result()? {
            warn!("{}: {}", warning.path, warning.message);
        }

        if !self.settings.service.user_mode && !self.privileged {
            return Err(SetupError::Environment(
                "Installing a system service requires root privileges; re-run with sudo".to_string(),
            ));
        }

        if self.profile.os_family == OsFamily::Unknown && !self.options.skip_packages {
            return Err(SetupError::Environment(format!(
                "Unsupported operating system '{}'; install the dependencies manually and re-run with --skip-packages",
                self.probe.os
            )));
        }
        Ok(true)
    }

    async fn provision_packages(&self) -> Result<bool, SetupError> {
        if self.options.skip_packages {
            info!("Skipping package installation");
            return Ok(false);
        }

        let manager = PackageManager::detect(self.profile.os_family, &self.probe).ok_or_else(|| {
            SetupError::Provisioning {
                step: InstallStage::ProvisionPackages.to_string(),
                message: format!(
                    "No supported package manager found for {}; install {} manually and re-run with --skip-packages",
                    self.profile.os_family,
                    self.settings.provision.system_packages.join(", ")
                ),
            }
        })?;
        info!("Using {}", manager);

        let provisioner = Provisioner::new(self.runner.as_ref(), &self.settings.provision);
        provisioner.install_system_packages(manager).await?;
        provisioner.install_python_packages().await?;
        Ok(true)
    }

    async fn verify_imports(&self) -> Result<bool, SetupError> {
        Provisioner::new(self.runner.as_ref(), &self.settings.provision)
            .verify_imports()
            .await?;
        Ok(true)
    }

    fn create_artifacts(&self, report: &mut InstallReport) -> Result<bool, SetupError> {
        let paths = &self.settings.paths;

        for dir in [&paths.app_dir, &paths.log_dir] {
            let status = ensure_dir(dir)?;
            self.hand_over(dir, status)?;
            record(report, dir, status);
        }

        let config_path = self.settings.config_path();
        let status = if config_path.exists() {
            ConfigurationRecord::load(&config_path)?;
            ArtifactStatus::Reused
        } else {
            ConfigurationRecord::default().save(&config_path)?;
            ArtifactStatus::Created
        };
        self.hand_over(&config_path, status)?;
        record(report, &config_path, status);

        let automations = self.settings.automations_path();
        let status = write_if_absent(&automations, "[]\n")?;
        self.hand_over(&automations, status)?;
        record(report, &automations, status);

        let status = write_if_absent(&paths.settings_file, &self.settings.to_toml()?)?;
        record(report, &paths.settings_file, status);

        if let Some(source) = &self.options.source_dir {
            for entry in fs::read_dir(source)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let dest = paths.app_dir.join(entry.file_name());
                let status = if dest.exists() {
                    ArtifactStatus::Reused
                } else {
                    fs::copy(entry.path(), &dest)?;
                    ArtifactStatus::Created
                };
                self.hand_over(&dest, status)?;
                record(report, &dest, status);
            }
        }
        Ok(true)
    }

    async fn register_service(&self, report: &mut InstallReport) -> Result<bool, SetupError> {
        if supervision_kind(&self.profile) == SupervisionKind::Unmanaged {
            info!("No service manager; the service is registered on first start");
            return Ok(false);
        }

        let systemd = SystemdSupervisor::from_settings(&self.settings, self.runner.clone());
        let unit = systemd.generate_unit();
        let status = match fs::read_to_string(systemd.unit_path()) {
            Ok(existing) if existing == unit => ArtifactStatus::Reused,
            _ => {
                systemd.install().await?;
                ArtifactStatus::Created
            }
        };
        record(report, systemd.unit_path(), status);
        Ok(true)
    }

    fn install_controller(&self, report: &mut InstallReport) -> Result<bool, SetupError> {
        let dest = &self.settings.paths.controller;
        if dest.exists() {
            record(report, dest, ArtifactStatus::Reused);
            return Ok(true);
        }

        let source = match &self.options.executable {
            Some(path) => path.clone(),
            None => std::env::current_exe()?,
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, dest)?;
        fs::set_permissions(dest, fs::Permissions::from_mode(0o755))?;
        record(report, dest, ArtifactStatus::Created);
        Ok(true)
    }

    fn configure(&mut self) -> Result<bool, SetupError> {
        if !self.prompter.is_interactive() {
            info!("Non-interactive run, keeping configuration defaults");
            return Ok(false);
        }

        let path = self.settings.config_path();
        let current = ConfigurationRecord::load(&path)?;
        let mut updated = current.clone();
        let prompter = self.prompter.as_mut();

        updated.api_key = prompter.ask("24Fire API key", &current.api_key)?;
        updated.internal_id = prompter.ask("Internal server ID", &current.internal_id)?;
        updated.webhook_url = prompter.ask("Discord webhook URL (optional)", &current.webhook_url)?;
        updated.host = prompter.ask("Web interface host", &current.host)?;
        updated.port = ask_port(&mut *prompter, current.port)?;

        let level = prompter
            .ask("Log level", &current.log_level)?
            .to_ascii_uppercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            updated.log_level = level;
        } else {
            warn!("Unknown log level '{}', keeping {}", level, current.log_level);
        }

        if updated != current {
            updated.save(&path)?;
            info!("Saved configuration to {}", path.display());
        }
        Ok(true)
    }

    async fn enable_and_finish(&self, report: &mut InstallReport) -> Result<bool, SetupError> {
        let supervisor = select_supervisor(&self.profile, &self.settings, self.runner.clone());

        report.outcomes.push(supervisor.enable().await?);
        if self.options.start {
            report.outcomes.push(supervisor.start().await?);
        } else {
            info!("Not starting the service (--no-start)");
        }
        Ok(true)
    }

    /// Give a freshly created artifact to the service account.
    fn hand_over(&self, path: &Path, status: ArtifactStatus) -> Result<(), SetupError> {
        let user = self.settings.service.run_as_user.as_str();
        if status == ArtifactStatus::Reused
            || !self.privileged
            || user.is_empty()
            || user == "root"
        {
            return Ok(());
        }
        if !geteuid().is_root() {
            return Ok(());
        }

        let account = User::from_name(user)
            .map_err(|e| {
                SetupError::Environment(format!("Failed to look up user '{}': {}", user, e))
            })?
            .ok_or_else(|| SetupError::Environment(format!("User '{}' does not exist", user)))?;

        chown(path, Some(account.uid), Some(account.gid)).map_err(std::io::Error::from)?;
        Ok(())
    }
}

fn record(report: &mut InstallReport, path: &Path, status: ArtifactStatus) {
    info!("{} {}", status, path.display());
    report.artifacts.push((path.to_path_buf(), status));
}

fn ensure_dir(path: &Path) -> Result<ArtifactStatus, SetupError> {
    if path.is_dir() {
        return Ok(ArtifactStatus::Reused);
    }
    fs::create_dir_all(path)?;
    Ok(ArtifactStatus::Created)
}

fn write_if_absent(path: &Path, contents: &str) -> Result<ArtifactStatus, SetupError> {
    if path.exists() {
        return Ok(ArtifactStatus::Reused);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(ArtifactStatus::Created)
}

/// Ask for a port, allowing one retry before falling back to `current`.
fn ask_port(prompter: &mut dyn Prompter, current: u16) -> Result<u16, SetupError> {
    let default = current.to_string();
    for _ in 0..2 {
        let answer = prompter.ask("Web interface port", &default)?;
        match answer.trim().parse::<u16>() {
            Ok(port) if port > 0 => return Ok(port),
            _ => warn!("'{}' is not a valid port (1-65535)", answer),
        }
    }
    warn!("Keeping port {}", current);
    Ok(current)
}

#[cfg(test)]
#[path = "installer_tests.rs"]
mod tests;
