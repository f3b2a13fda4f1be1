//! Wire types of the automation API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// One automation: a trigger and the action it fires.
///
/// Trigger and action configs are owned by the application and passed
/// through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub name: String,
    pub trigger_type: String,
    #[serde(default)]
    pub trigger_config: Map<String, Value>,
    pub action_type: String,
    #[serde(default)]
    pub action_config: Map<String, Value>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Automation {
    /// Parse an operator-supplied definition.
    pub fn from_json(content: &str) -> Result<Self, ClientError> {
        let automation: Self = serde_json::from_str(content)
            .map_err(|e| ClientError::InvalidDefinition(e.to_string()))?;
        if automation.id.trim().is_empty() {
            return Err(ClientError::InvalidDefinition("id must not be empty".to_string()));
        }
        Ok(automation)
    }
}

/// Acknowledgement returned by mutating endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

/// Host statistics reported by `GET /status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemStats {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub active_automations: u64,
    pub total_automations: u64,
    pub scheduler_running: bool,
}
