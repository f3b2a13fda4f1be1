//! Settings schema for the installer and lifecycle controller.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the installer persists settings and where the controller looks first.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/fireauto/settings.toml";

/// Root settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub service: ServiceSettings,

    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub supervision: SupervisionSettings,

    #[serde(default)]
    pub provision: ProvisionSettings,
}

/// Restart behaviour of the supervised workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    #[default]
    Always,
    Never,
}

impl RestartPolicy {
    /// Value for the systemd `Restart=` directive.
    pub fn as_systemd(&self) -> &'static str {
        match self {
            RestartPolicy::Always => "always",
            RestartPolicy::Never => "no",
        }
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::Never => write!(f, "never"),
        }
    }
}

/// Service identity and how to run it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default = "default_entry_command")]
    pub entry_command: String,

    #[serde(default = "default_run_as_user")]
    pub run_as_user: String,

    #[serde(default)]
    pub restart_policy: RestartPolicy,

    #[serde(default = "default_restart_delay")]
    pub restart_delay_secs: u32,

    /// Register with `systemctl --user` instead of the system manager.
    #[serde(default)]
    pub user_mode: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            description: default_description(),
            entry_command: default_entry_command(),
            run_as_user: default_run_as_user(),
            restart_policy: RestartPolicy::default(),
            restart_delay_secs: default_restart_delay(),
            user_mode: false,
        }
    }
}

fn default_service_name() -> String {
    "fireauto".to_string()
}

fn default_description() -> String {
    "24Fire Automation Service".to_string()
}

fn default_entry_command() -> String {
    "python3 main.py".to_string()
}

fn default_run_as_user() -> String {
    ["SUDO_USER", "USER"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|user| !user.is_empty())
        .unwrap_or_else(|| "root".to_string())
}

fn default_restart_delay() -> u32 {
    10
}

/// Filesystem locations of everything the installer writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_app_dir")]
    pub app_dir: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Installed controller entry point.
    #[serde(default = "default_controller")]
    pub controller: PathBuf,

    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Directory holding the unit file. Derived from `user_mode` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_dir: Option<PathBuf>,

    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            app_dir: default_app_dir(),
            log_dir: default_log_dir(),
            controller: default_controller(),
            pid_file: default_pid_file(),
            log_file: default_log_file(),
            unit_dir: None,
            settings_file: default_settings_file(),
        }
    }
}

fn default_app_dir() -> PathBuf {
    PathBuf::from("/opt/fireauto")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/fireauto")
}

fn default_controller() -> PathBuf {
    PathBuf::from("/usr/local/bin/fireauto")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/fireauto.pid")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/tmp/fireauto.log")
}

fn default_settings_file() -> PathBuf {
    PathBuf::from(DEFAULT_SETTINGS_PATH)
}

/// Timing knobs for the supervision strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionSettings {
    /// Pause between the stop and start phases of `restart`.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    /// How long to wait for the process to exit after SIGTERM.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// A freshly spawned process must still be alive after this long.
    #[serde(default = "default_start_grace")]
    pub start_grace_millis: u64,

    /// How long a managed restart may take to report `active`.
    #[serde(default = "default_active_timeout")]
    pub active_timeout_secs: u64,
}

impl Default for SupervisionSettings {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay(),
            stop_timeout_secs: default_stop_timeout(),
            start_grace_millis: default_start_grace(),
            active_timeout_secs: default_active_timeout(),
        }
    }
}

fn default_settle_delay() -> u64 {
    2
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_start_grace() -> u64 {
    500
}

fn default_active_timeout() -> u64 {
    15
}

impl SupervisionSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_millis)
    }

    pub fn active_timeout(&self) -> Duration {
        Duration::from_secs(self.active_timeout_secs)
    }
}

/// Dependencies the installer provisions and verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionSettings {
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_system_packages")]
    pub system_packages: Vec<String>,

    #[serde(default = "default_python_packages")]
    pub python_packages: Vec<String>,

    /// Modules that must import cleanly before the service is registered.
    #[serde(default = "default_python_packages")]
    pub verify_imports: Vec<String>,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            python: default_python(),
            system_packages: default_system_packages(),
            python_packages: default_python_packages(),
            verify_imports: default_python_packages(),
        }
    }
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_system_packages() -> Vec<String> {
    vec!["python3".to_string(), "python3-pip".to_string()]
}

fn default_python_packages() -> Vec<String> {
    ["fastapi", "uvicorn", "websockets", "requests", "psutil", "apscheduler"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Settings {
    /// Full path of the native unit definition.
    pub fn unit_path(&self) -> PathBuf {
        let file = format!("{}.service", self.service.name);
        if let Some(ref dir) = self.paths.unit_dir {
            return dir.join(file);
        }
        if self.service.user_mode {
            dirs::config_dir()
                .map(|c| c.join("systemd").join("user").join(&file))
                .unwrap_or_else(|| PathBuf::from("/tmp").join(&file))
        } else {
            PathBuf::from("/etc/systemd/system").join(file)
        }
    }

    /// Configuration record read by the application.
    pub fn config_path(&self) -> PathBuf {
        self.paths.app_dir.join("config.json")
    }

    /// Automation definitions read by the application.
    pub fn automations_path(&self) -> PathBuf {
        self.paths.app_dir.join("automations.json")
    }

    /// Rewrite leading `~` in every path setting.
    pub fn expand_paths(&mut self) {
        let expand =
            |p: &PathBuf| PathBuf::from(crate::SettingsLoader::expand_path(&p.to_string_lossy()));
        self.paths.app_dir = expand(&self.paths.app_dir);
        self.paths.log_dir = expand(&self.paths.log_dir);
        self.paths.controller = expand(&self.paths.controller);
        self.paths.pid_file = expand(&self.paths.pid_file);
        self.paths.log_file = expand(&self.paths.log_file);
        self.paths.settings_file = expand(&self.paths.settings_file);
        self.paths.unit_dir = self.paths.unit_dir.as_ref().map(expand);
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> Result<String, crate::ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
