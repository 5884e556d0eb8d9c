//! HTTP strategies for resolving payload keys to full audio.
//!
//! Plugged into `AudioCacheService` in order: the binary download first,
//! then the base64 text resource.

use crate::client::TempoServerClient;
use async_trait::async_trait;
use base64::Engine as _;
use tempo_playback::{AudioResolver, PlaybackError};
use tracing::debug;

fn network_error(name: &str, err: impl std::fmt::Display) -> PlaybackError {
    PlaybackError::NetworkFetchFailed(format!("{name}: {err}"))
}

/// Downloads binary audio and base64-encodes it.
#[derive(Clone)]
pub struct PrimaryAudioResolver {
    client: TempoServerClient,
    path: String,
}

impl PrimaryAudioResolver {
    /// Use the client's configured binary audio path.
    pub fn new(client: TempoServerClient) -> Self {
        let path = client.config().primary_audio_path.clone();
        Self::with_path(client, path)
    }

    /// `path` may contain `{key}`.
    pub fn with_path(client: TempoServerClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl AudioResolver for PrimaryAudioResolver {
    fn name(&self) -> &str {
        "binary"
    }

    async fn resolve(&self, key: &str) -> tempo_playback::Result<String> {
        let url = self
            .client
            .endpoint(&self.path, Some(key))
            .map_err(|e| network_error(self.name(), e))?;
        let bytes = self
            .client
            .fetch_bytes(url)
            .await
            .map_err(|e| network_error(self.name(), e))?;

        if bytes.is_empty() {
            return Err(network_error(self.name(), "empty response body"));
        }

        debug!(size = bytes.len(), "Downloaded binary audio");
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// Downloads audio that the server already serves as base64 text.
#[derive(Clone)]
pub struct SecondaryAudioResolver {
    client: TempoServerClient,
    path: String,
}

impl SecondaryAudioResolver {
    /// Use the client's configured base64 audio path.
    pub fn new(client: TempoServerClient) -> Self {
        let path = client.config().secondary_audio_path.clone();
        Self::with_path(client, path)
    }

    pub fn with_path(client: TempoServerClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl AudioResolver for SecondaryAudioResolver {
    fn name(&self) -> &str {
        "base64"
    }

    async fn resolve(&self, key: &str) -> tempo_playback::Result<String> {
        let url = self
            .client
            .endpoint(&self.path, Some(key))
            .map_err(|e| network_error(self.name(), e))?;
        let text = self
            .client
            .fetch_text(url)
            .await
            .map_err(|e| network_error(self.name(), e))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(network_error(self.name(), "empty response body"));
        }

        debug!(size = text.len(), "Downloaded base64 audio");
        Ok(text.to_string())
    }
}
