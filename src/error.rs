//! Error types for the request gate

use thiserror::Error;

/// Request gate error
#[derive(Debug, Error)]
pub enum FetchError {
    /// Caller or setup defect (missing demo fixture, unresolvable route, bad header)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Server answered with a non-2xx status
    #[error("Request failed with status {status}{}", render_message(.message))]
    RequestFailure { status: u16, message: String },

    /// Ticket or download response is missing required fields
    #[error("Invalid response: {0}")]
    InvalidTicket(String),

    /// Transport failed before a usable response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON encoding/decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a local file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn render_message(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

impl FetchError {
    /// Status code of a failed response, if this is a `RequestFailure`
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RequestFailure { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether repeating the whole call might succeed.
    ///
    /// Advisory only: the gate itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::RequestFailure { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, FetchError>;
