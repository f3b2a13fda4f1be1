//! Lifecycle controller: maps operator verbs onto the active strategy.
//!
//! The controller keeps no state between invocations. Each one builds a
//! fresh [`Controller`], which re-detects the host and re-selects the
//! supervision strategy.

use std::sync::Arc;

use fireauto_config::{ConfigValidator, ConfigurationRecord, Settings};
use tracing::{debug, warn};

use crate::error::DaemonError;
use crate::host::{HostProfile, OsFamily, resolve_program};
use crate::runner::{CommandRunner, SystemRunner};
use crate::supervisor::{
    Outcome, StatusReport, SupervisionKind, Supervisor, select_supervisor, supervision_kind,
};

/// Operator verbs accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Status,
    Logs,
    Enable,
    Disable,
    /// Open the configuration record in an editor.
    Config,
    /// Run the dependency self-check.
    Test,
    /// Show where the web interface listens.
    Web,
}

impl Verb {
    pub const ALL: [Verb; 10] = [
        Verb::Start,
        Verb::Stop,
        Verb::Restart,
        Verb::Status,
        Verb::Logs,
        Verb::Enable,
        Verb::Disable,
        Verb::Config,
        Verb::Test,
        Verb::Web,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Status => "status",
            Verb::Logs => "logs",
            Verb::Enable => "enable",
            Verb::Disable => "disable",
            Verb::Config => "config",
            Verb::Test => "test",
            Verb::Web => "web",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| format!("unknown command '{}'", s))
    }
}

/// Text for the operator and the status to exit with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlReport {
    pub lines: Vec<String>,
    pub exit_code: i32,
}

impl ControlReport {
    fn ok(lines: Vec<String>) -> Self {
        Self {
            lines,
            exit_code: 0,
        }
    }
}

/// One line of the self-check.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Check {
    passed: bool,
    message: String,
}

impl Check {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    fn render(&self) -> String {
        let mark = if self.passed { "[ok]  " } else { "[FAIL]" };
        format!("{} {}", mark, self.message)
    }
}

/// Dispatches a single verb.
pub struct Controller {
    profile: HostProfile,
    settings: Settings,
    runner: Arc<dyn CommandRunner>,
    interactive: bool,
}

impl Controller {
    pub fn new(
        profile: HostProfile,
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        interactive: bool,
    ) -> Self {
        Self {
            profile,
            settings,
            runner,
            interactive,
        }
    }

    /// Controller for the machine this process runs on.
    pub fn from_host(settings: Settings, interactive: bool) -> Self {
        Self::new(HostProfile::detect(), settings, Arc::new(SystemRunner), interactive)
    }

    pub fn profile(&self) -> &HostProfile {
        &self.profile
    }

    pub fn kind(&self) -> SupervisionKind {
        supervision_kind(&self.profile)
    }

    fn supervisor(&self) -> Box<dyn Supervisor> {
        select_supervisor(&self.profile, &self.settings, self.runner.clone())
    }

    pub async fn dispatch(&self, verb: Verb) -> Result<ControlReport, DaemonError> {
        debug!("Dispatching '{}' ({})", verb, self.kind());

        match verb {
            Verb::Start => self.supervisor().start().await.map(|o| self.render(o)),
            Verb::Stop => self.supervisor().stop().await.map(|o| self.render(o)),
            Verb::Restart => self.supervisor().restart().await.map(|o| self.render(o)),
            Verb::Status => self
                .supervisor()
                .status()
                .await
                .map(|report| self.render_status(report)),
            Verb::Logs => self.supervisor().logs().await.map(|o| self.render(o)),
            Verb::Enable => self.supervisor().enable().await.map(|o| self.render(o)),
            Verb::Disable => self.supervisor().disable().await.map(|o| self.render(o)),
            Verb::Config => self.edit_config().await,
            Verb::Test => Ok(self.self_check().await),
            Verb::Web => Ok(self.web().await),
        }
    }

    fn render(&self, outcome: Outcome) -> ControlReport {
        let name = &self.settings.service.name;
        let with_pid = |text: String, pid: Option<u32>| match pid {
            Some(pid) => format!("{} (PID {})", text, pid),
            None => text,
        };

        let lines = match outcome {
            Outcome::Started { pid } => vec![with_pid(format!("Started {}", name), pid)],
            Outcome::AlreadyRunning { pid } => {
                vec![with_pid(format!("{} is already running", name), pid)]
            }
            Outcome::Stopped => vec![format!("Stopped {}", name)],
            Outcome::NotRunning => vec![format!("{} is not running", name)],
            Outcome::Restarted { pid } => vec![with_pid(format!("Restarted {}", name), pid)],
            Outcome::Enabled => vec![format!("Enabled {} to start at boot", name)],
            Outcome::Disabled => vec![format!("Disabled {} at boot", name)],
            Outcome::Unsupported { action } => vec![format!(
                "'{}' is not supported without systemd; run '{} start' after each boot",
                action,
                self.settings.paths.controller.display()
            )],
            Outcome::LogsClosed => Vec::new(),
            Outcome::NoLogs { path } => vec![format!("No log output yet at {}", path.display())],
        };
        ControlReport::ok(lines)
    }

    fn render_status(&self, report: StatusReport) -> ControlReport {
        let lines = match report.kind {
            SupervisionKind::Managed => report.detail.lines().map(str::to_string).collect(),
            SupervisionKind::Unmanaged => vec![
                format!("{} ({})", self.settings.service.name, report.kind),
                format!("  {}", report.detail),
                format!("  Log file: {}", self.settings.paths.log_file.display()),
            ],
        };
        ControlReport::ok(lines)
    }

    /// Open the configuration record in the operator's editor.
    async fn edit_config(&self) -> Result<ControlReport, DaemonError> {
        let editor = editor_command(
            std::env::var("VISUAL").ok(),
            std::env::var("EDITOR").ok(),
            resolve_program("nano").is_some(),
        );
        let path = self.settings.config_path();
        let path = path.to_string_lossy();

        let mut words = editor.split_whitespace();
        let program = words.next().unwrap_or("vi");
        let mut args: Vec<&str> = words.collect();
        args.push(path.as_ref());

        let code = self.runner.attach(program, &args).await?;
        Ok(ControlReport {
            lines: Vec::new(),
            exit_code: code,
        })
    }

    /// Check everything the service needs to run.
    async fn self_check(&self) -> ControlReport {
        let mut checks = vec![Check::pass(format!(
            "Host: {}, supervision {}",
            self.profile.os_family,
            self.kind()
        ))];

        let python = self.settings.provision.python.as_str();
        let interpreter_ok = match self.runner.capture(python, &["--version"]).await {
            Ok(out) if out.success() => {
                let version = if out.stdout.trim().is_empty() {
                    out.stderr.trim().to_string()
                } else {
                    out.stdout.trim().to_string()
                };
                checks.push(Check::pass(format!("Interpreter: {}", version)));
                true
            }
            Ok(out) => {
                checks.push(Check::fail(format!(
                    "Interpreter '{}' exited with code {}",
                    python, out.code
                )));
                false
            }
            Err(e) => {
                checks.push(Check::fail(format!("Interpreter '{}': {}", python, e)));
                false
            }
        };

        for module in &self.settings.provision.verify_imports {
            if !interpreter_ok {
                checks.push(Check::fail(format!("Module {}: no interpreter", module)));
                continue;
            }
            let statement = format!("import {}", module);
            match self.runner.capture(python, &["-c", &statement]).await {
                Ok(out) if out.success() => checks.push(Check::pass(format!("Module {}", module))),
                Ok(out) => checks.push(Check::fail(format!(
                    "Module {}: {}",
                    module,
                    out.stderr.trim().lines().last().unwrap_or("import failed")
                ))),
                Err(e) => checks.push(Check::fail(format!("Module {}: {}", module, e))),
            }
        }

        let config_path = self.settings.config_path();
        checks.push(match ConfigurationRecord::load(&config_path) {
            Ok(record) => {
                let validation = ConfigValidator::validate_record(&record);
                if validation.is_valid() {
                    for warning in &validation.warnings {
                        warn!("{}: {}", warning.path, warning.message);
                    }
                    Check::pass(format!("Configuration: {}", config_path.display()))
                } else {
                    let problems: Vec<String> = validation
                        .errors
                        .iter()
                        .map(|e| format!("{}: {}", e.path, e.message))
                        .collect();
                    Check::fail(format!("Configuration: {}", problems.join("; ")))
                }
            }
            Err(e) => Check::fail(format!("Configuration: {}", e)),
        });

        let automations = self.settings.automations_path();
        checks.push(if automations.is_file() {
            Check::pass(format!("Automations: {}", automations.display()))
        } else {
            Check::fail(format!("Automations: {} is missing", automations.display()))
        });

        checks.push(match self.kind() {
            SupervisionKind::Managed => {
                let unit = self.settings.unit_path();
                if unit.is_file() {
                    Check::pass(format!("Service unit: {}", unit.display()))
                } else {
                    Check::fail(format!("Service unit: {} is missing", unit.display()))
                }
            }
            SupervisionKind::Unmanaged => Check::pass(format!(
                "Service registration: not needed, PID file {}",
                self.settings.paths.pid_file.display()
            )),
        });

        let failed = checks.iter().filter(|c| !c.passed).count();
        let mut lines: Vec<String> = checks.iter().map(Check::render).collect();
        if failed == 0 {
            lines.push("All checks passed".to_string());
        } else {
            lines.push(format!("{} check(s) failed", failed));
        }

        ControlReport {
            lines,
            exit_code: if failed == 0 { 0 } else { 1 },
        }
    }

    /// Print the web interface address and offer to open it.
    async fn web(&self) -> ControlReport {
        let record = match ConfigurationRecord::load(&self.settings.config_path()) {
            Ok(record) => record,
            Err(e) => {
                warn!("Using default web address: {}", e);
                ConfigurationRecord::default()
            }
        };
        let url = record.web_url();

        if self.interactive && graphical_session(self.profile.os_family) {
            let opener = if self.profile.os_family == OsFamily::Macos {
                "open"
            } else {
                "xdg-open"
            };
            match self.runner.capture(opener, &[url.as_str()]).await {
                Ok(out) if out.success() => debug!("Opened {} with {}", url, opener),
                Ok(out) => debug!("{} exited with {}", opener, out.code),
                Err(e) => debug!("Could not open browser: {}", e),
            }
        }

        ControlReport::ok(vec![format!("Web interface: {}", url)])
    }
}

/// Editor to launch: `$VISUAL`, then `$EDITOR`, then nano, then vi.
pub fn editor_command(visual: Option<String>, editor: Option<String>, has_nano: bool) -> String {
    [visual, editor]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| if has_nano { "nano" } else { "vi" }.to_string())
}

fn graphical_session(os: OsFamily) -> bool {
    match os {
        OsFamily::Macos => true,
        _ => std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some(),
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
