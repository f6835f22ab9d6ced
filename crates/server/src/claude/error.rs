//! Errors from the Claude API client and the kitchen tools.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when talking to Claude or running a tool for it.
#[derive(Debug, Error)]
pub enum ClaudeError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request.
    #[error("API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    /// Too many requests; retry after this many seconds.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The API is temporarily overloaded (HTTP 529).
    #[error("Claude is overloaded")]
    Overloaded,

    /// The API key was refused.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The client could not be built from configuration.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    /// A response body or stream event could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The response stream broke off.
    #[error("stream error: {0}")]
    Stream(String),

    /// A tool call failed. The message is shown to the model.
    #[error("tool execution error: {0}")]
    ToolExecution(String),
}

impl ClaudeError {
    /// Whether retrying later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Overloaded)
    }
}

/// Error body returned by the Messages API.
///
/// ```json
/// {"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}
/// ```
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub error: ApiError,
}

/// The `error` object of an [`ApiErrorResponse`], also sent as a stream event.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl From<ApiError> for ClaudeError {
    fn from(error: ApiError) -> Self {
        if error.error_type == "overloaded_error" {
            return Self::Overloaded;
        }
        Self::Api {
            error_type: error.error_type,
            message: error.message,
        }
    }
}
