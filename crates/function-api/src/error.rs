//! Error types for function-api

use thiserror::Error;

/// Errors returned by the remote function-management API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FunctionApiError {
    /// No function exists under the given identifier
    #[error("function not found: {function_name}")]
    NotFound { function_name: String },

    /// The API answered with a non-success status
    #[error("function API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Client misconfiguration (bad endpoint, bad timeout)
    #[error("invalid function API configuration: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for FunctionApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FunctionApiError::Decode(err.to_string())
        } else {
            FunctionApiError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FunctionApiError {
    fn from(err: serde_json::Error) -> Self {
        FunctionApiError::Decode(err.to_string())
    }
}
