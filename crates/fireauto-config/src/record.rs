//! The configuration record read by the supervised application.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Log levels the application understands.
pub const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Key-value document stored as `config.json` in the application directory.
///
/// Keys this crate does not know about are carried through untouched so
/// that rewriting the record never drops settings the application owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub internal_id: String,

    #[serde(rename = "discord_webhook_url", default)]
    pub webhook_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    62599
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for ConfigurationRecord {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            internal_id: String::new(),
            webhook_url: String::new(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            extra: Map::new(),
        }
    }
}

impl ConfigurationRecord {
    /// Read the record from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse the record from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::InvalidFormat(format!("config record: {}", e)))
    }

    /// Write the record, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Address of the application's web interface.
    pub fn web_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
