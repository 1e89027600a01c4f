//! Client error types.

use thiserror::Error;

/// Client error type. `Clone` so every debounced caller can receive the one outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No descriptor for this action. A programming error, not a runtime condition.
    #[error("Unknown action '{action}' on state '{state}'")]
    UnknownAction { state: String, action: String },

    /// The server ran the action and refused it; carries its message.
    #[error("{0}")]
    Server(String),

    /// Network failure or an unusable response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed payload.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The call was dropped before an outcome was produced.
    #[error("Action cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Parse(e.to_string())
    }
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;
