//! Types for Tempo API requests and responses.

use serde::{Deserialize, Serialize};
use tempo_core::{Track, TrackId};

/// Connection settings for a Tempo server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// API base URL (e.g., "http://localhost:8000/api")
    pub url: String,

    /// Bearer token sent with every request
    pub access_token: Option<String>,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Path of the binary audio resource; `{key}` is replaced by the
    /// payload key
    pub primary_audio_path: String,

    /// Path of the base64 text resource used when the binary one fails
    pub secondary_audio_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/api".to_string(),
            access_token: None,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            primary_audio_path: "audio/{key}".to_string(),
            secondary_audio_path: "audio/{key}/base64".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create a config with a token.
    pub fn with_token(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::new(url)
        }
    }
}

// =============================================================================
// Track Types
// =============================================================================

/// Track id as sent by the server: numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(u64),
    Text(String),
}

impl From<WireId> for TrackId {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Number(n) => TrackId::from(n),
            WireId::Text(s) => TrackId::new(s),
        }
    }
}

/// Track record from `GET /tracks` and `GET /favorites`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackResponse {
    pub id: WireId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub size_mb: Option<f64>,
    #[serde(default)]
    pub encoded_audio: Option<String>,
}

impl From<TrackResponse> for Track {
    fn from(raw: TrackResponse) -> Self {
        let mut track = Track::new(raw.id, raw.title, raw.artist);
        track.album = raw.album;
        track.duration_secs = raw.duration;
        track.size_mb = raw.size_mb;
        track.encoded_audio = raw.encoded_audio;
        track
    }
}

// =============================================================================
// Favorites Types
// =============================================================================

/// Body for `POST /favorites` and `DELETE /favorites`.
///
/// Numeric ids go out as numbers, which is what the server expects.
#[derive(Debug, Serialize)]
pub struct FavoriteRequest {
    #[serde(rename = "trackId")]
    pub track_id: serde_json::Value,
}

impl FavoriteRequest {
    pub fn new(id: &TrackId) -> Self {
        let track_id = id
            .as_str()
            .parse::<u64>()
            .map_or_else(|_| serde_json::Value::from(id.as_str()), serde_json::Value::from);
        Self { track_id }
    }
}

/// Generic `{ "message": ... }` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}
