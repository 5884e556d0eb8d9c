//! In-memory track catalogue
//!
//! Mirrors what the provider last returned. The playback core looks tracks
//! up here by id; it never mutates entries.

use crate::error::Result;
use crate::traits::TrackProvider;
use crate::types::{Track, TrackId};
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Catalogue {
    tracks: Vec<Track>,
    favorites: Vec<Track>,
}

/// Shared, read-mostly track catalogue
#[derive(Debug, Default)]
pub struct TrackStore {
    inner: RwLock<Catalogue>,
}

impl TrackStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with tracks
    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        let store = Self::new();
        store.replace_tracks(tracks);
        store
    }

    /// Look a track up by id, searching the catalogue then the favorites
    pub fn get(&self, id: &TrackId) -> Option<Track> {
        let catalogue = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        catalogue
            .tracks
            .iter()
            .chain(catalogue.favorites.iter())
            .find(|track| &track.id == id)
            .cloned()
    }

    /// Snapshot of the catalogue
    pub fn tracks(&self) -> Vec<Track> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tracks
            .clone()
    }

    /// Snapshot of the favorites
    pub fn favorites(&self) -> Vec<Track> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .favorites
            .clone()
    }

    /// Replace the catalogue, keeping `is_favorite` in sync with the favorites
    pub fn replace_tracks(&self, tracks: Vec<Track>) {
        let mut catalogue = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        catalogue.tracks = tracks;
        Self::sync_favorite_flags(&mut catalogue);
    }

    /// Replace the favorites and re-flag the catalogue
    pub fn replace_favorites(&self, favorites: Vec<Track>) {
        let mut catalogue = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        catalogue.favorites = favorites
            .into_iter()
            .map(|mut track| {
                track.is_favorite = true;
                track
            })
            .collect();
        Self::sync_favorite_flags(&mut catalogue);
    }

    /// Reload tracks and favorites from a provider
    ///
    /// Favorites are fetched first so the catalogue is flagged in one pass.
    pub async fn refresh(&self, provider: &dyn TrackProvider) -> Result<()> {
        let favorites = provider.get_favorites().await?;
        let tracks = provider.get_tracks().await?;

        info!(
            tracks = tracks.len(),
            favorites = favorites.len(),
            "Track catalogue refreshed"
        );

        self.replace_favorites(favorites);
        self.replace_tracks(tracks);
        Ok(())
    }

    fn sync_favorite_flags(catalogue: &mut Catalogue) {
        let favorite_ids: HashSet<&TrackId> =
            catalogue.favorites.iter().map(|track| &track.id).collect();

        let mut flagged = 0usize;
        for track in &mut catalogue.tracks {
            track.is_favorite = favorite_ids.contains(&track.id);
            flagged += usize::from(track.is_favorite);
        }
        debug!(flagged, "Synchronised favorite flags");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedProvider;

    #[async_trait]
    impl TrackProvider for FixedProvider {
        async fn get_tracks(&self) -> Result<Vec<Track>> {
            Ok(vec![
                Track::new("1", "One", "A"),
                Track::new("2", "Two", "B"),
            ])
        }

        async fn get_favorites(&self) -> Result<Vec<Track>> {
            Ok(vec![Track::new("2", "Two", "B")])
        }
    }

    #[test]
    fn get_finds_catalogue_tracks() {
        let store = TrackStore::with_tracks(vec![Track::new("1", "One", "A")]);
        assert_eq!(store.get(&TrackId::new("1")).unwrap().title, "One");
        assert!(store.get(&TrackId::new("missing")).is_none());
    }

    #[test]
    fn favorites_flag_catalogue_entries() {
        let store = TrackStore::with_tracks(vec![
            Track::new("1", "One", "A"),
            Track::new("2", "Two", "B"),
        ]);
        store.replace_favorites(vec![Track::new("2", "Two", "B")]);

        let tracks = store.tracks();
        assert!(!tracks[0].is_favorite);
        assert!(tracks[1].is_favorite);
        assert!(store.favorites()[0].is_favorite);
    }

    #[tokio::test]
    async fn refresh_pulls_from_provider() {
        let store = TrackStore::new();
        store.refresh(&FixedProvider).await.unwrap();

        assert_eq!(store.tracks().len(), 2);
        assert!(store.get(&TrackId::new("2")).unwrap().is_favorite);
        assert!(!store.get(&TrackId::new("1")).unwrap().is_favorite);
    }
}
