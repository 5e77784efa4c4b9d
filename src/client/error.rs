use reqwest::StatusCode;
use thiserror::Error;

use super::validation::ValidationError;

/// Failure of a single request against the task API.
///
/// `Clone` so one fetch outcome can be handed to every reader attached to it.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request rejected ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Client {
        status: StatusCode,
        detail: Option<String>,
    },
    #[error("server error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Server {
        status: StatusCode,
        detail: Option<String>,
    },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl ApiError {
    /// Classify a non-success status into client or server failure
    pub fn from_status(status: StatusCode, detail: Option<String>) -> Self {
        if status.is_server_error() {
            ApiError::Server { status, detail }
        } else {
            ApiError::Client { status, detail }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Network(_) => "NETWORK_ERROR",
            ApiError::Client { .. } => "CLIENT_ERROR",
            ApiError::Server { .. } => "SERVER_ERROR",
            ApiError::Decode(_) => "DECODE_ERROR",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unsupported(_) => "UNSUPPORTED_OPERATION",
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Text shown to the user in an error banner or next to a form
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Could not reach the server. Check your connection and retry.".to_string()
            }
            ApiError::Client { status, detail } => detail.clone().unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request rejected")
                    .to_string()
            }),
            ApiError::Server { .. } => {
                "The server failed to process the request. Please try again later.".to_string()
            }
            ApiError::Decode(_) => "The server sent a response that could not be read.".to_string(),
            ApiError::Validation(err) => err.to_string(),
            ApiError::Unsupported(op) => format!("This action is not available: {}", op),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ApiError::Decode(value.to_string())
        } else {
            ApiError::Network(value.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::Decode(value.to_string())
    }
}
