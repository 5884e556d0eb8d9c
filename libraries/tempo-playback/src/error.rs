//! Error types for playback management

use tempo_core::{CoreError, TrackId};
use thiserror::Error;

/// Why a payload was refused by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRejection {
    /// Payload decoded to nothing
    Empty,
    /// Payload is not base64 at all
    NotBase64,
    /// Decoded text is a server placeholder ("Audio data for ...")
    Placeholder,
    /// No known container signature and no placeholder marker
    UnrecognizedFormat,
}

impl std::fmt::Display for PayloadRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Empty => "empty payload",
            Self::NotBase64 => "payload is not valid base64",
            Self::Placeholder => "server sent placeholder text instead of audio data",
            Self::UnrecognizedFormat => "no known audio signature",
        };
        f.write_str(reason)
    }
}

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Engine was destroyed (or never set up)
    #[error("Audio engine not initialized")]
    EngineNotInitialized,

    /// Nothing is assigned to the audio resource, or the track has no payload
    #[error("No audio source")]
    NoAudioSource,

    /// Platform could not buffer the source
    #[error("Failed to load audio: {0}")]
    LoadFailed(String),

    /// Platform refused playback without a user gesture
    #[error("Playback blocked by autoplay policy: {0}")]
    PlaybackBlocked(String),

    /// Platform rejected `play()` for a reason other than autoplay policy
    #[error("Playback failed: {0}")]
    PlayFailed(String),

    /// Payload is not playable audio
    #[error("Invalid audio payload: {0}")]
    InvalidAudioPayload(PayloadRejection),

    /// A resolution strategy could not fetch the full payload
    #[error("Network fetch failed: {0}")]
    NetworkFetchFailed(String),

    /// A newer load replaced this one before it completed
    #[error("Load superseded by a newer request")]
    Superseded,

    /// Track id is not in the store
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Track store / provider error
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PlaybackError {
    /// Whether navigation should treat this as "track unplayable, try another"
    pub fn is_unplayable(&self) -> bool {
        matches!(
            self,
            Self::NoAudioSource
                | Self::LoadFailed(_)
                | Self::PlayFailed(_)
                | Self::InvalidAudioPayload(_)
                | Self::NetworkFetchFailed(_)
                | Self::TrackNotFound(_)
        )
    }

    /// Whether the platform is waiting for a user gesture
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::PlaybackBlocked(_))
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
