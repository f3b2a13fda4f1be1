//! Settings and configuration record validation.

use crate::error::ConfigError;
use crate::record::{ConfigurationRecord, LOG_LEVELS};
use crate::schema::{RestartPolicy, Settings};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a `ConfigError`, returning warnings otherwise.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Settings and record validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate installer/controller settings.
    pub fn validate(settings: &Settings) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_service(settings, &mut result);
        Self::validate_paths(settings, &mut result);
        Self::validate_supervision(settings, &mut result);

        result
    }

    /// Validate the application's configuration record.
    pub fn validate_record(record: &ConfigurationRecord) -> ValidationResult {
        let mut result = ValidationResult::default();

        if record.port == 0 {
            result.add_error(ValidationError::new(
                "port",
                "Port must be between 1 and 65535",
            ));
        }

        if record.host.trim().is_empty() {
            result.add_error(ValidationError::new("host", "Host cannot be empty"));
        }

        if !LOG_LEVELS
            .iter()
            .any(|level| level.eq_ignore_ascii_case(&record.log_level))
        {
            result.add_error(ValidationError::new(
                "log_level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    record.log_level, LOG_LEVELS
                ),
            ));
        }

        if !record.webhook_url.is_empty()
            && !record.webhook_url.starts_with("http://")
            && !record.webhook_url.starts_with("https://")
        {
            result.add_error(ValidationError::new(
                "discord_webhook_url",
                "Webhook URL must start with http:// or https://",
            ));
        }

        if record.api_key.is_empty() {
            result.add_warning(ValidationWarning::new(
                "api_key",
                "API key is not set, the service cannot reach the 24Fire API",
            ));
        }

        result
    }

    fn validate_service(settings: &Settings, result: &mut ValidationResult) {
        let service = &settings.service;

        if service.name.is_empty() {
            result.add_error(ValidationError::new(
                "service.name",
                "Service name cannot be empty",
            ));
        } else if !service
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'))
        {
            result.add_error(ValidationError::new(
                "service.name",
                format!("Service name '{}' contains invalid characters", service.name),
            ));
        }

        if service.entry_command.trim().is_empty() {
            result.add_error(ValidationError::new(
                "service.entry_command",
                "Entry command cannot be empty",
            ));
        }

        if service.run_as_user.trim().is_empty() {
            result.add_error(ValidationError::new(
                "service.run_as_user",
                "run_as_user cannot be empty",
            ));
        }

        if service.restart_policy == RestartPolicy::Never && service.restart_delay_secs > 0 {
            result.add_warning(ValidationWarning::new(
                "service.restart_delay_secs",
                "restart_delay_secs has no effect when restart_policy is never",
            ));
        }
    }

    fn validate_paths(settings: &Settings, result: &mut ValidationResult) {
        if !settings.paths.app_dir.is_absolute() {
            result.add_error(ValidationError::new(
                "paths.app_dir",
                "Application directory must be an absolute path",
            ));
        }

        if settings.paths.pid_file == settings.paths.log_file {
            result.add_error(ValidationError::new(
                "paths.pid_file",
                "pid_file and log_file must differ",
            ));
        }
    }

    fn validate_supervision(settings: &Settings, result: &mut ValidationResult) {
        if settings.supervision.stop_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "supervision.stop_timeout_secs",
                "stop_timeout_secs must be greater than 0",
            ));
        }

        if settings.supervision.settle_delay_secs > 60 {
            result.add_warning(ValidationWarning::new(
                "supervision.settle_delay_secs",
                "settle_delay_secs is very high (>60), restarts will be slow",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
