//! Error types for pbview
//!
//! The view state machine itself never fails; these errors only come from
//! the transport and from configuration loading.

use thiserror::Error;

/// Main error type for pbview
#[derive(Error, Debug)]
pub enum PbViewError {
    // Network errors
    #[error("view service unreachable at {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    // Encoding errors
    #[error("serialization error: {0}")]
    Serialization(String),

    // Configuration errors
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PbViewError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout)
    }
}

impl From<serde_json::Error> for PbViewError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for pbview
pub type Result<T> = std::result::Result<T, PbViewError>;
