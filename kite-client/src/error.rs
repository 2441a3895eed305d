//! Error types for the Kite client

use kite_core::CanonicalError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Kite client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The coordinator answered with a non-success status
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body as returned by the coordinator
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid request, rejected before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// More than one OIDC audience was requested
    #[error("the API only supports at most one element in the audience, got {0}")]
    TooManyAudiences(usize),

    /// The caller cancelled the call
    #[error("request cancelled")]
    Cancelled,

    /// Canonical field values could not be computed
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// HTTP status returned by the coordinator, if the error came from one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if the job was already claimed or changed state underneath us
    ///
    /// Losing an acquire race is an expected outcome, not a network failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ApiError { status: 409 | 422, .. })
    }

    /// Check if the job exists but cannot be acquired yet
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::ApiError { status: 423, .. })
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }

    /// Check if the caller cancelled the call
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
