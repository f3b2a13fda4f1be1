//! Settings loader.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::schema::Settings;

/// Settings loader with environment variable substitution.
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load settings from a string.
    pub fn load_str(content: &str) -> Result<Settings, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let mut settings: Settings = toml::from_str(&expanded)?;
        settings.expand_paths();
        Ok(settings)
    }

    /// Load settings from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Settings, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Settings::default()),
            other => other,
        }
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.config`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_settings() {
        let settings = SettingsLoader::load_str("").unwrap();
        assert_eq!(settings.service.name, "fireauto");
    }

    #[test]
    fn test_load_partial_settings() {
        let content = r#"
            [service]
            name = "automation"
            entry_command = "python3 app.py"

            [paths]
            app_dir = "/srv/automation"
        "#;
        let settings = SettingsLoader::load_str(content).unwrap();
        assert_eq!(settings.service.name, "automation");
        assert_eq!(settings.service.entry_command, "python3 app.py");
        assert_eq!(settings.paths.app_dir, PathBuf::from("/srv/automation"));
        assert_eq!(settings.paths.log_dir, PathBuf::from("/var/log/fireauto"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[supervision]").unwrap();
        writeln!(file, "settle_delay_secs = 5").unwrap();

        let settings = SettingsLoader::load(file.path()).unwrap();
        assert_eq!(settings.supervision.settle_delay_secs, 5);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SettingsLoader::load(Path::new("/nonexistent/fireauto/settings.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let settings =
            SettingsLoader::load_or_default(Path::new("/nonexistent/fireauto/settings.toml"))
                .unwrap();
        assert_eq!(settings.service.name, "fireauto");
    }

    #[test]
    fn test_load_or_default_propagates_parse_errors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid = [unclosed").unwrap();
        assert!(SettingsLoader::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: This test runs in isolation and sets a unique test-only env var
        unsafe {
            std::env::set_var("FIREAUTO_TEST_APP_DIR", "/srv/from-env");
        }
        let content = "[paths]\napp_dir = \"${FIREAUTO_TEST_APP_DIR}\"";
        let settings = SettingsLoader::load_str(content).unwrap();
        assert_eq!(settings.paths.app_dir, PathBuf::from("/srv/from-env"));
        unsafe {
            std::env::remove_var("FIREAUTO_TEST_APP_DIR");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${FIREAUTO_NONEXISTENT_VAR_12345}\"";
        let result = SettingsLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = SettingsLoader::expand_path("~/test");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/test"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        assert_eq!(SettingsLoader::expand_path("/usr/local/bin"), "/usr/local/bin");
    }
}
