/// Track domain type
use crate::types::TrackId;
use serde::{Deserialize, Serialize};

/// Playable catalogue entry
///
/// Owned by the track store; the playback core only reads it by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Album name
    #[serde(default)]
    pub album: Option<String>,

    /// Album art reference (URL or data URI)
    #[serde(default)]
    pub artwork: Option<String>,

    /// Duration in seconds as reported by the server
    #[serde(default)]
    pub duration_secs: Option<f64>,

    /// File size in megabytes as reported by the server
    #[serde(default)]
    pub size_mb: Option<f64>,

    /// Audio payload reference: inline base64 audio, or a short key the
    /// audio cache resolves to the full payload
    #[serde(default)]
    pub encoded_audio: Option<String>,

    /// Whether the current user marked this track as a favorite
    #[serde(default)]
    pub is_favorite: bool,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            artwork: None,
            duration_secs: None,
            size_mb: None,
            encoded_audio: None,
            is_favorite: false,
        }
    }

    /// Attach an audio payload reference
    #[must_use]
    pub fn with_audio(mut self, encoded_audio: impl Into<String>) -> Self {
        self.encoded_audio = Some(encoded_audio.into());
        self
    }

    /// Whether the track carries any audio payload reference at all
    pub fn has_audio(&self) -> bool {
        self.encoded_audio
            .as_deref()
            .is_some_and(|payload| !payload.is_empty())
    }
}
