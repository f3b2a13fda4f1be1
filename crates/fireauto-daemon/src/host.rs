//! Host capability detection.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Operating system family, as far as service supervision cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Debian,
    Redhat,
    GenericLinux,
    Macos,
    Unknown,
}

impl OsFamily {
    /// Families on which systemd is a candidate service manager.
    pub fn is_linux(&self) -> bool {
        matches!(self, OsFamily::Debian | OsFamily::Redhat | OsFamily::GenericLinux)
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Debian => write!(f, "debian"),
            OsFamily::Redhat => write!(f, "redhat"),
            OsFamily::GenericLinux => write!(f, "generic_linux"),
            OsFamily::Macos => write!(f, "macos"),
            OsFamily::Unknown => write!(f, "unknown"),
        }
    }
}

/// What the host offers. Computed once per invocation and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostProfile {
    pub os_family: OsFamily,
    pub has_native_service_manager: bool,
}

/// Where detection looks: filesystem root, OS name and program search path.
#[derive(Debug, Clone)]
pub struct HostProbe {
    pub root: PathBuf,
    pub os: String,
    pub search_path: Option<OsString>,
}

impl HostProbe {
    /// Probe the machine this process runs on.
    pub fn system() -> Self {
        Self {
            root: PathBuf::from("/"),
            os: std::env::consts::OS.to_string(),
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Probe a directory tree standing in for `/`.
    pub fn with_root(root: impl Into<PathBuf>, os: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            os: os.into(),
            search_path: None,
        }
    }

    /// Set the program search path.
    pub fn search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    fn marker(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }

    /// Locate an executable on the probe's search path.
    pub fn find_program(&self, name: &str) -> Option<PathBuf> {
        let paths = self.search_path.as_ref()?;
        which::which_in(name, Some(paths), &self.root).ok()
    }

    /// `ID` and `ID_LIKE` tokens from `/etc/os-release`.
    fn os_release_ids(&self) -> Vec<String> {
        let content = match fs::read_to_string(self.root.join("etc/os-release")) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter_map(|line| line.split_once('='))
            .filter(|(key, _)| matches!(key.trim(), "ID" | "ID_LIKE"))
            .flat_map(|(_, value)| {
                value
                    .trim()
                    .trim_matches(|c| c == '"' || c == '\'')
                    .split_whitespace()
                    .map(|id| id.to_ascii_lowercase())
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl HostProfile {
    /// Detect the current host. Never fails.
    pub fn detect() -> Self {
        Self::detect_with(&HostProbe::system())
    }

    /// Detect using an explicit probe.
    pub fn detect_with(probe: &HostProbe) -> Self {
        let os_family = classify(probe);
        let has_native_service_manager = os_family.is_linux() && systemd_usable(probe);

        debug!(
            "Host profile: os_family={}, native_service_manager={}",
            os_family, has_native_service_manager
        );

        Self {
            os_family,
            has_native_service_manager,
        }
    }
}

fn classify(probe: &HostProbe) -> OsFamily {
    match probe.os.as_str() {
        "macos" => OsFamily::Macos,
        "linux" => {
            let ids = probe.os_release_ids();
            let has_id = |wanted: &[&str]| ids.iter().any(|id| wanted.contains(&id.as_str()));

            if probe.marker("etc/debian_version") || has_id(&["debian", "ubuntu"]) {
                OsFamily::Debian
            } else if probe.marker("etc/redhat-release")
                || probe.marker("etc/fedora-release")
                || probe.marker("etc/centos-release")
                || has_id(&["rhel", "fedora", "centos"])
            {
                OsFamily::Redhat
            } else {
                OsFamily::GenericLinux
            }
        }
        _ => OsFamily::Unknown,
    }
}

/// `systemctl` is reachable and the host was booted with systemd.
fn systemd_usable(probe: &HostProbe) -> bool {
    probe.find_program("systemctl").is_some() && probe.marker("run/systemd/system")
}

/// Resolve `program` against the real `PATH`, returning it unchanged when absolute.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    if Path::new(program).is_absolute() {
        return Some(PathBuf::from(program));
    }
    which::which(program).ok()
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
