//! Transport error types

use thiserror::Error;

/// Failure of a single attempt against the downstream API
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// The call went through but the payload could not be interpreted
    pub fn is_malformed(&self) -> bool {
        matches!(self, TransportError::Malformed(_))
    }

    /// HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Network(e) => e.status().map(|s| s.as_u16()),
            TransportError::Malformed(_) => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Malformed(e.to_string())
    }
}
