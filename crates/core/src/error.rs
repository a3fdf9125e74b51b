//! Error types for calls to the upstream quoting/routing/balance service.

use serde::Deserialize;

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Errors that can occur when calling the upstream service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream returned a non-success status.
    #[error("Upstream error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<i64>,
    },

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parameters could not be encoded for the endpoint.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl UpstreamError {
    /// Build an API error from a status code and response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(error_body) => Self::Api {
                status,
                message: error_body.message,
                code: error_body.code,
            },
            Err(_) => Self::Api {
                status,
                message: if body.is_empty() {
                    "empty response body".to_string()
                } else {
                    body.to_string()
                },
                code: None,
            },
        }
    }
}

/// Error body returned by the upstream on failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}
