//! HTTP client for the automation API.

use std::time::Duration;

use fireauto_config::ConfigurationRecord;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::types::{ApiMessage, Automation, SystemStats};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Address to reach the service at, given where it listens.
///
/// A wildcard bind address is not connectable on every host, so it is
/// swapped for loopback.
pub fn api_base_url(record: &ConfigurationRecord) -> String {
    match record.host.as_str() {
        "" | "0.0.0.0" => format!("http://127.0.0.1:{}", record.port),
        "::" | "[::]" => format!("http://[::1]:{}", record.port),
        _ => record.web_url(),
    }
}

/// Client for one running instance.
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base })
    }

    /// Client for the instance described by the configuration record.
    pub fn from_record(record: &ConfigurationRecord) -> Result<Self, ClientError> {
        Self::new(&api_base_url(record))
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub async fn list_automations(&self) -> Result<Vec<Automation>, ClientError> {
        let url = self.endpoint(&["automations"])?;
        self.send(self.client.get(url)).await
    }

    /// Register a new automation. Returns the service's acknowledgement.
    pub async fn create_automation(&self, automation: &Automation) -> Result<String, ClientError> {
        let url = self.endpoint(&["automations"])?;
        let reply: ApiMessage = self.send(self.client.post(url).json(automation)).await?;
        Ok(reply.message)
    }

    /// Run an automation's action now, regardless of its trigger.
    pub async fn execute_automation(&self, id: &str) -> Result<String, ClientError> {
        let url = self.endpoint(&["automations", id, "execute"])?;
        let reply: ApiMessage = self.send(self.client.post(url)).await?;
        Ok(reply.message)
    }

    pub async fn delete_automation(&self, id: &str) -> Result<String, ClientError> {
        let url = self.endpoint(&["automations", id])?;
        let reply: ApiMessage = self.send(self.client.delete(url)).await?;
        Ok(reply.message)
    }

    pub async fn stats(&self) -> Result<SystemStats, ClientError> {
        let url = self.endpoint(&["status"])?;
        self.send(self.client.get(url)).await
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base.to_string(),
                reason: "not a hierarchical URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", response.url(), status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response.json().await?)
    }
}

/// Pull the reason out of an error body (`detail` or `message`), else the raw text.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match map.get(key) {
                Some(Value::String(text)) => return text.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
