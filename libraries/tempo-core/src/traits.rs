/// Core traits for Tempo
use crate::error::Result;
use crate::types::Track;
use async_trait::async_trait;

/// Source of track metadata
///
/// The playback core never talks to the network directly; whatever serves
/// the catalogue (REST client, fixture, local database) implements this.
#[async_trait]
pub trait TrackProvider: Send + Sync {
    /// Fetch the full catalogue
    async fn get_tracks(&self) -> Result<Vec<Track>>;

    /// Fetch the current user's favorites
    async fn get_favorites(&self) -> Result<Vec<Track>>;
}
