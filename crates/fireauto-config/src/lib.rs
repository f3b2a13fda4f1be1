//! # fireauto Config
//!
//! Settings for the installer and lifecycle controller (TOML), and the
//! configuration record consumed by the supervised application (JSON).

mod error;
mod loader;
mod record;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::SettingsLoader;
pub use record::{ConfigurationRecord, LOG_LEVELS};
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
