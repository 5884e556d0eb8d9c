//! Error types for the Tempo API client.

use tempo_core::CoreError;
use tempo_playback::PlaybackError;
use thiserror::Error;

/// Errors that can occur when talking to a Tempo server.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Missing, expired or rejected token
    #[error("Authentication required")]
    AuthRequired,

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),
}

impl From<ServerClientError> for CoreError {
    fn from(err: ServerClientError) -> Self {
        CoreError::provider(err.to_string())
    }
}

impl From<ServerClientError> for PlaybackError {
    fn from(err: ServerClientError) -> Self {
        PlaybackError::NetworkFetchFailed(err.to_string())
    }
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;
