//! Automation API client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached, or the response was not JSON.
    #[error("Request to the automation API failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Automation API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid API address '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// An automation definition supplied by the operator does not parse.
    #[error("Invalid automation definition: {0}")]
    InvalidDefinition(String),
}

impl ClientError {
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ClientError::Status {
            status: 404,
            message: "Automation not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("Automation not found"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_invalid_url_display() {
        let err = ClientError::InvalidUrl {
            url: "http//nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert!(err.to_string().contains("http//nope"));
    }
}
