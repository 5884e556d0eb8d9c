/// Core error types for Tempo
use crate::types::TrackId;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for Tempo
#[derive(Error, Debug)]
pub enum CoreError {
    /// Track not found in the catalogue
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Metadata provider failed (network, parsing, auth)
    #[error("Track provider error: {0}")]
    Provider(String),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}
