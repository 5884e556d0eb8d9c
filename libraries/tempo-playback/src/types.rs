//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempo_core::TrackId;

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when the playlist ends
    #[default]
    #[serde(rename = "none")]
    Off,

    /// Loop the entire playlist
    All,

    /// Loop the current track only
    One,
}

impl RepeatMode {
    /// Next mode in the toggle cycle: none → all → one → none
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }
}

/// Shuffle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Playlist order
    #[default]
    Off,

    /// Random pick, never the current track
    On,
}

impl ShuffleMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Conceptual transport state, derived from the status fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No track selected
    Idle,

    /// A track is selected and its payload is being resolved/loaded
    Loading,

    /// Currently playing
    Playing,

    /// Track selected but not playing
    Paused,
}

/// Observable playback status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    /// Selected track (set optimistically before its load completes)
    pub current_track_id: Option<TrackId>,

    pub is_playing: bool,

    /// Seconds, never negative
    pub current_time: f64,

    /// Seconds, never negative
    pub duration: f64,

    /// Linear volume in [0, 1]
    pub volume: f64,

    pub repeat: RepeatMode,

    pub shuffle: ShuffleMode,
}

impl PlaybackStatus {
    pub(crate) fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            current_track_id: None,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: clamp_volume(config.volume),
            repeat: config.repeat,
            shuffle: config.shuffle,
        }
    }
}

/// Ordered track ids plus the selected position
///
/// `current_index` is `None` when nothing is selected; it is always a valid
/// index otherwise, and an empty playlist forces `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistState {
    tracks: Vec<TrackId>,
    current_index: Option<usize>,
}

impl PlaylistState {
    /// Replace the track list wholesale
    ///
    /// The selected index survives unless it no longer fits.
    pub fn set_tracks(&mut self, tracks: Vec<TrackId>) {
        self.tracks = tracks;
        if self.current_index.is_some_and(|index| index >= self.tracks.len()) {
            self.current_index = None;
        }
    }

    /// Select an index; `false` (and no change) if out of bounds
    pub fn select(&mut self, index: Option<usize>) -> bool {
        match index {
            Some(index) if index >= self.tracks.len() => false,
            _ => {
                self.current_index = index;
                true
            }
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    pub fn track_at(&self, index: usize) -> Option<&TrackId> {
        self.tracks.get(index)
    }

    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|track| track == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Whether the selected entry is the final one
    pub fn is_at_last(&self) -> bool {
        self.current_index
            .is_some_and(|index| index + 1 == self.tracks.len())
    }
}

/// Configuration for the playback service and its engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial volume (0.0-1.0, default: 1.0)
    pub volume: f64,

    /// Initial repeat mode (default: none)
    pub repeat: RepeatMode,

    /// Initial shuffle mode (default: off)
    pub shuffle: ShuffleMode,

    /// Spurious-pause protection after `play()` (default: 500 ms, 0 disables)
    pub protection_window_ms: u64,

    /// Delay before the silent re-play of a spurious pause (default: 100 ms)
    pub replay_delay_ms: u64,

    /// Step for skip forward/backward in seconds (default: 10)
    pub skip_step_secs: f64,

    /// Audio cache time-to-live in seconds (default: 24 h)
    pub cache_ttl_secs: u64,

    /// Seed for shuffle picks; `None` seeds from entropy
    pub shuffle_seed: Option<u64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            repeat: RepeatMode::Off,
            shuffle: ShuffleMode::Off,
            protection_window_ms: 500,
            replay_delay_ms: 100,
            skip_step_secs: 10.0,
            cache_ttl_secs: 24 * 60 * 60,
            shuffle_seed: None,
        }
    }
}

impl PlaybackConfig {
    pub fn protection_window(&self) -> Duration {
        Duration::from_millis(self.protection_window_ms)
    }

    pub fn replay_delay(&self) -> Duration {
        Duration::from_millis(self.replay_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Clamp a linear volume into [0, 1]; NaN becomes silence
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
