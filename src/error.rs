use reqwest::StatusCode;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// User input rejected by a form or command
    #[error("Invalid value for '{field}': {code}")]
    Validation { field: String, code: String },

    /// Upstream API answered with a non-success status
    #[error("Upstream error ({status}): {message}")]
    UpstreamError { status: StatusCode, message: String },

    /// HTTP request error (connection, DNS, TLS, body decoding)
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Upstream answered but the payload did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Host service call failed
    #[error("Service call {service} failed: {message}")]
    Dispatch { service: String, message: String },

    /// Persisted state could not be read or written
    #[error("State error: {0}")]
    StateError(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            code: code.into(),
        }
    }

    pub fn dispatch(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable name, used in events and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "config_error",
            Self::Validation { .. } => "validation_error",
            Self::UpstreamError { .. } => "upstream_error",
            Self::HttpRequest(_) => "http_request_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Dispatch { .. } => "dispatch_error",
            Self::StateError(_) => "state_error",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(format!("JSON error: {}", err))
    }
}
