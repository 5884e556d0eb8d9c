//! Entry points used by views
//!
//! [`TracksController`] handles "play this track from this list";
//! [`PlayerController`] maps transport buttons onto the service.

use crate::error::{PlaybackError, Result};
use crate::manager::{NavigationOutcome, PlaybackService};
use crate::types::{RepeatMode, ShuffleMode};
use std::sync::Arc;
use tempo_core::{TrackId, TrackProvider, TrackStore};
use tracing::{debug, info, warn};

/// What `play_track` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayTrackOutcome {
    /// The requested track is playing
    Playing,

    /// It was already the current, playing track
    AlreadyPlaying,

    /// Loaded, but the platform wants a user gesture before playing
    AwaitingGesture,

    /// The requested track was unplayable; navigation moved on
    Skipped(NavigationOutcome),

    /// The requested track was unplayable and nothing follows it
    Unplayable,

    /// Another selection took over while loading
    Superseded,
}

/// Track list interactions
pub struct TracksController {
    service: Arc<PlaybackService>,
    store: Arc<TrackStore>,
}

impl TracksController {
    pub fn new(service: Arc<PlaybackService>) -> Self {
        let store = Arc::clone(service.tracks());
        Self { service, store }
    }

    /// Reload tracks and favorites from a provider
    pub async fn load_catalogue(&self, provider: &dyn TrackProvider) -> Result<()> {
        self.store.refresh(provider).await?;
        Ok(())
    }

    /// Play `id` with `playlist` as the new playlist
    ///
    /// Unknown tracks and tracks without a payload hand over to the next
    /// playlist entry when there is one. A track whose payload fails
    /// validation does the same. An autoplay refusal is not an error.
    pub async fn play_track(&self, id: &TrackId, playlist: Vec<TrackId>) -> Result<PlayTrackOutcome> {
        let index = playlist.iter().position(|entry| entry == id);
        let has_following = index.is_some_and(|i| i + 1 < playlist.len());
        let track = self.store.get(id);

        debug!(
            track_id = %id,
            known = track.is_some(),
            has_audio = track.as_ref().is_some_and(tempo_core::Track::has_audio),
            "play_track requested"
        );

        if !track.as_ref().is_some_and(tempo_core::Track::has_audio) {
            warn!(track_id = %id, "Track missing or without audio");
            if !has_following {
                return Ok(PlayTrackOutcome::Unplayable);
            }
            self.service.set_playlist(playlist);
            self.service.set_current_index(index)?;
            return Ok(self.skip_ahead().await);
        }

        let status = self.service.status();
        let is_current = status.current_track_id.as_ref() == Some(id);
        if is_current && status.is_playing {
            debug!(track_id = %id, "Track already playing");
            return Ok(PlayTrackOutcome::AlreadyPlaying);
        }
        if status.is_playing && !is_current {
            self.service.pause()?;
        }

        self.service.set_playlist(playlist);
        self.service.set_current_index(index)?;

        match self.service.select_track(id).await {
            Ok(()) => {}
            Err(PlaybackError::Superseded) => return Ok(PlayTrackOutcome::Superseded),
            Err(e) if e.is_unplayable() => {
                warn!(track_id = %id, error = %e, "Unplayable track, trying the next one");
                if has_following {
                    return Ok(self.skip_ahead().await);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        }

        match self.service.play().await {
            Ok(()) => {
                info!(track_id = %id, "Playback started");
                Ok(PlayTrackOutcome::Playing)
            }
            Err(e) if e.is_blocked() => {
                warn!(track_id = %id, "Autoplay blocked, waiting for user gesture");
                Ok(PlayTrackOutcome::AwaitingGesture)
            }
            Err(PlaybackError::Superseded) => Ok(PlayTrackOutcome::Superseded),
            Err(e) => Err(e),
        }
    }

    async fn skip_ahead(&self) -> PlayTrackOutcome {
        match self.service.next().await {
            Ok(outcome) => PlayTrackOutcome::Skipped(outcome),
            Err(e) => {
                warn!(error = %e, "Moving to the next track failed");
                PlayTrackOutcome::Skipped(NavigationOutcome::Exhausted {
                    attempts: 0,
                    last_error: Some(e.to_string()),
                })
            }
        }
    }
}

/// Transport controls
pub struct PlayerController {
    service: Arc<PlaybackService>,
}

impl PlayerController {
    pub fn new(service: Arc<PlaybackService>) -> Self {
        Self { service }
    }

    pub async fn play(&self) -> Result<()> {
        self.service.play().await
    }

    pub fn pause(&self) -> Result<()> {
        self.service.pause()
    }

    /// Pause when playing, play otherwise; returns whether it is now playing
    pub async fn toggle_play_pause(&self) -> Result<bool> {
        if self.service.is_playing() {
            self.service.pause()?;
            Ok(false)
        } else {
            self.service.play().await?;
            Ok(true)
        }
    }

    pub async fn next(&self) -> Result<NavigationOutcome> {
        self.service.next().await
    }

    pub async fn previous(&self) -> Result<NavigationOutcome> {
        self.service.previous().await
    }

    pub fn seek(&self, time: f64) -> Result<()> {
        self.service.seek(time)
    }

    pub fn set_volume(&self, volume: f64) -> Result<f64> {
        self.service.set_volume(volume)
    }

    pub fn toggle_repeat(&self) -> RepeatMode {
        self.service.toggle_repeat()
    }

    pub fn toggle_shuffle(&self) -> ShuffleMode {
        self.service.toggle_shuffle()
    }

    pub fn skip_forward(&self) -> Result<()> {
        self.service.skip_forward()
    }

    pub fn skip_backward(&self) -> Result<()> {
        self.service.skip_backward()
    }
}
