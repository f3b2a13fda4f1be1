//! System and Python package provisioning.

use std::fmt;

use fireauto_config::ProvisionSettings;
use fireauto_daemon::{CommandRunner, HostProbe, OsFamily};
use tracing::info;

use crate::error::SetupError;

/// Native package manager used for system packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
    Apk,
    Brew,
}

impl PackageManager {
    const LINUX_ORDER: [PackageManager; 6] = [
        PackageManager::Apt,
        PackageManager::Dnf,
        PackageManager::Yum,
        PackageManager::Pacman,
        PackageManager::Zypper,
        PackageManager::Apk,
    ];

    /// Pick the package manager for `os`, checking the probe's search path.
    pub fn detect(os: OsFamily, probe: &HostProbe) -> Option<Self> {
        let candidates: &[PackageManager] = match os {
            OsFamily::Debian => &[PackageManager::Apt],
            OsFamily::Redhat => &[PackageManager::Dnf, PackageManager::Yum],
            OsFamily::GenericLinux => &Self::LINUX_ORDER,
            OsFamily::Macos => &[PackageManager::Brew],
            OsFamily::Unknown => &[],
        };

        candidates
            .iter()
            .copied()
            .find(|pm| probe.find_program(pm.program()).is_some())
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Pacman => "pacman",
            PackageManager::Zypper => "zypper",
            PackageManager::Apk => "apk",
            PackageManager::Brew => "brew",
        }
    }

    /// Commands that install `packages`, in order.
    pub fn install_commands(&self, packages: &[String]) -> Vec<Vec<String>> {
        let with = |base: &[&str]| -> Vec<String> {
            std::iter::once(self.program())
                .chain(base.iter().copied())
                .map(str::to_string)
                .chain(packages.iter().cloned())
                .collect()
        };

        match self {
            PackageManager::Apt => vec![
                vec!["apt-get".to_string(), "update".to_string()],
                with(&["install", "-y"]),
            ],
            PackageManager::Dnf | PackageManager::Yum => vec![with(&["install", "-y"])],
            PackageManager::Pacman => vec![with(&["-S", "--noconfirm", "--needed"])],
            PackageManager::Zypper => vec![with(&["--non-interactive", "install"])],
            PackageManager::Apk => vec![with(&["add"])],
            PackageManager::Brew => vec![with(&["install"])],
        }
    }

    /// Command an operator could run to remove `packages`.
    pub fn removal_hint(&self, packages: &[String]) -> String {
        let verb = match self {
            PackageManager::Apt => "apt-get remove",
            PackageManager::Dnf => "dnf remove",
            PackageManager::Yum => "yum remove",
            PackageManager::Pacman => "pacman -R",
            PackageManager::Zypper => "zypper remove",
            PackageManager::Apk => "apk del",
            PackageManager::Brew => "brew uninstall",
        };
        format!("{} {}", verb, packages.join(" "))
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Installs and verifies the service's dependencies.
pub struct Provisioner<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a ProvisionSettings,
}

impl<'a> Provisioner<'a> {
    pub fn new(runner: &'a dyn CommandRunner, settings: &'a ProvisionSettings) -> Self {
        Self { runner, settings }
    }

    async fn run(&self, step: &str, command: &[String]) -> Result<(), SetupError> {
        let Some((program, args)) = command.split_first() else {
            return Ok(());
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        info!("Running: {}", command.join(" "));
        let out = self
            .runner
            .capture(program, &args)
            .await
            .map_err(|e| SetupError::Provisioning {
                step: step.to_string(),
                message: e.to_string(),
            })?;

        if !out.success() {
            let detail = if out.stderr.trim().is_empty() {
                out.stdout.trim()
            } else {
                out.stderr.trim()
            };
            return Err(SetupError::Provisioning {
                step: step.to_string(),
                message: format!(
                    "`{}` exited with code {}: {}",
                    command.join(" "),
                    out.code,
                    detail.lines().last().unwrap_or_default()
                ),
            });
        }
        Ok(())
    }

    /// Install the configured system packages.
    pub async fn install_system_packages(&self, manager: PackageManager) -> Result<(), SetupError> {
        if self.settings.system_packages.is_empty() {
            return Ok(());
        }
        for command in manager.install_commands(&self.settings.system_packages) {
            self.run("provision-packages", &command).await?;
        }
        Ok(())
    }

    /// `pip install --upgrade` the configured Python packages.
    pub async fn install_python_packages(&self) -> Result<(), SetupError> {
        if self.settings.python_packages.is_empty() {
            return Ok(());
        }
        let python = self.settings.python.as_str();
        let command: Vec<String> = [python, "-m", "pip", "install", "--upgrade"]
            .into_iter()
            .map(str::to_string)
            .chain(self.settings.python_packages.iter().cloned())
            .collect();
        self.run("provision-packages", &command).await
    }

    /// Import every module the service needs in one interpreter run.
    pub async fn verify_imports(&self) -> Result<(), SetupError> {
        if self.settings.verify_imports.is_empty() {
            return Ok(());
        }
        let statement = format!("import {}", self.settings.verify_imports.join(", "));
        let python = self.settings.python.as_str();

        let out = self
            .runner
            .capture(python, &["-c", &statement])
            .await
            .map_err(|e| SetupError::Provisioning {
                step: "verify-imports".to_string(),
                message: e.to_string(),
            })?;

        if out.success() {
            info!("Verified imports: {}", self.settings.verify_imports.join(", "));
            return Ok(());
        }

        let message = match missing_module(&out.stderr) {
            Some(module) => format!(
                "Python module '{}' is not installed; run `{} -m pip install {}`",
                module, python, module
            ),
            None => format!(
                "`{} -c \"{}\"` exited with code {}",
                python, statement, out.code
            ),
        };
        Err(SetupError::Provisioning {
            step: "verify-imports".to_string(),
            message,
        })
    }
}

/// Module named in a Python `ModuleNotFoundError`.
fn missing_module(stderr: &str) -> Option<&str> {
    let rest = stderr.split("No module named ").nth(1)?;
    let rest = rest.trim_start_matches(['\'', '"']);
    rest.split(['\'', '"', '\n']).next().filter(|m| !m.is_empty())
}
