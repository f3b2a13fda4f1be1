//! Declarative description of the supervised workload.

use std::path::PathBuf;

use fireauto_config::{RestartPolicy, Settings};

/// How to run the automation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub description: String,
    pub working_directory: PathBuf,
    pub entry_command: String,
    pub run_as_user: String,
    pub restart_policy: RestartPolicy,
    pub restart_delay_seconds: u32,
    /// Registered with the per-user service manager rather than the system one.
    pub user_mode: bool,
}

impl ServiceDescriptor {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            name: settings.service.name.clone(),
            description: settings.service.description.clone(),
            working_directory: settings.paths.app_dir.clone(),
            entry_command: settings.service.entry_command.trim().to_string(),
            run_as_user: settings.service.run_as_user.clone(),
            restart_policy: settings.service.restart_policy,
            restart_delay_seconds: settings.service.restart_delay_secs,
            user_mode: settings.service.user_mode,
        }
    }

    /// First word of the entry command and the remainder.
    pub fn program_and_args(&self) -> (&str, &str) {
        match self.entry_command.split_once(char::is_whitespace) {
            Some((program, rest)) => (program, rest.trim_start()),
            None => (self.entry_command.as_str(), ""),
        }
    }
}
