//! Every path the installer may create.

use std::fmt;
use std::path::{Path, PathBuf};

use fireauto_config::Settings;
use fireauto_daemon::PidFile;

/// Whether an install run wrote an artifact or found it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Created,
    Reused,
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactStatus::Created => write!(f, "created"),
            ArtifactStatus::Reused => write!(f, "reused"),
        }
    }
}

/// Paths owned by an installation. None of them exist after an uninstall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledArtifactSet {
    pub app_dir: PathBuf,
    pub unit_file: PathBuf,
    pub controller: PathBuf,
    pub log_dir: PathBuf,
    pub pid_file: PathBuf,
    pub pid_lock: PathBuf,
    pub log_file: PathBuf,
    pub settings_file: PathBuf,
}

impl InstalledArtifactSet {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            app_dir: settings.paths.app_dir.clone(),
            unit_file: settings.unit_path(),
            controller: settings.paths.controller.clone(),
            log_dir: settings.paths.log_dir.clone(),
            pid_file: settings.paths.pid_file.clone(),
            pid_lock: PidFile::new(&settings.paths.pid_file).lock_path(),
            log_file: settings.paths.log_file.clone(),
            settings_file: settings.paths.settings_file.clone(),
        }
    }

    /// All paths, in removal order.
    pub fn paths(&self) -> Vec<&Path> {
        vec![
            &self.unit_file,
            &self.controller,
            &self.app_dir,
            &self.log_dir,
            &self.pid_file,
            &self.pid_lock,
            &self.log_file,
            &self.settings_file,
        ]
    }

    /// Paths that are still present on disk.
    pub fn existing(&self) -> Vec<PathBuf> {
        self.paths()
            .into_iter()
            // symlink_metadata also catches dangling links.
            .filter(|p| p.symlink_metadata().is_ok())
            .map(Path::to_path_buf)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_settings() {
        let artifacts = InstalledArtifactSet::from_settings(&Settings::default());
        assert_eq!(artifacts.app_dir, PathBuf::from("/opt/fireauto"));
        assert_eq!(artifacts.pid_lock, PathBuf::from("/tmp/fireauto.pid.lock"));
        assert_eq!(
            artifacts.unit_file,
            PathBuf::from("/etc/systemd/system/fireauto.service")
        );
        assert_eq!(artifacts.paths().len(), 8);
    }

    #[test]
    fn test_existing() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.paths.app_dir = dir.path().join("app");
        settings.paths.log_dir = dir.path().join("logs");
        settings.paths.controller = dir.path().join("bin/fireauto");
        settings.paths.pid_file = dir.path().join("fireauto.pid");
        settings.paths.log_file = dir.path().join("fireauto.log");
        settings.paths.unit_dir = Some(dir.path().join("units"));
        settings.paths.settings_file = dir.path().join("etc/settings.toml");

        let artifacts = InstalledArtifactSet::from_settings(&settings);
        assert!(artifacts.existing().is_empty());

        std::fs::create_dir_all(&artifacts.app_dir).unwrap();
        std::fs::write(&artifacts.log_file, "").unwrap();
        assert_eq!(
            artifacts.existing(),
            vec![artifacts.app_dir.clone(), artifacts.log_file.clone()]
        );
    }
}
