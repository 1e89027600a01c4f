//! Engine error types.

use state_storage::StorageError;
use thiserror::Error;

/// Failure inside a state type's field mapping or method table.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },

    /// Domain failure reported by the method itself. Shown to users verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("State does not serialize to an object")]
    NotAnObject,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    pub fn rejected(message: impl Into<String>) -> Self {
        ModelError::Rejected(message.into())
    }
}

/// Engine error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Missing or malformed declaration. Fatal at registration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown state: {0}")]
    StateNotFound(String),

    #[error("Unknown action '{action}' on state '{state}'")]
    ActionNotFound { state: String, action: String },

    #[error("Action '{action}' on state '{state}' runs on the client")]
    ClientOnlyAction { state: String, action: String },

    /// Storage read or write failed.
    #[error("Failed to persist state: {0}")]
    Persist(#[from] StorageError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
