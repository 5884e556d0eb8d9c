//! Tempo - Playback Engine & Playlist Navigation
//!
//! Platform-agnostic playback core for the Tempo client.
//!
//! This crate provides:
//! - An audio engine owning the single platform audio resource
//! - Base64 payload decoding and audio signature validation
//! - A TTL cache resolving short payload keys to full audio
//! - Playlist navigation (shuffle, repeat none/all/one, skip) that steps
//!   over unplayable tracks
//! - Typed engine events for UI synchronization
//!
//! # Architecture
//!
//! `tempo-playback` never talks to a platform directly. The audio element
//! is reached through the [`AudioBackend`] trait; [`HeadlessBackend`] is the
//! built-in implementation for tools and tests.
//!
//! ```text
//! TracksController → PlaybackService → decoder / AudioCacheService
//!                          ↑                      ↓
//!                    PlaybackEvent  ←──────  AudioEngine → AudioBackend
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tempo_core::{Track, TrackId, TrackStore};
//! use tempo_playback::{HeadlessBackend, NavigationOutcome, PlaybackConfig, PlaybackService};
//!
//! # tokio_test_block(async {
//! // "ID3" header followed by a frame byte, base64-encoded
//! let store = Arc::new(TrackStore::with_tracks(vec![
//!     Track::new("1", "Intro", "Artist").with_audio("SUQzBA=="),
//! ]));
//!
//! let service = PlaybackService::with_backend(
//!     Box::new(HeadlessBackend::new()),
//!     store,
//!     PlaybackConfig::default(),
//! )
//! .unwrap();
//!
//! service.set_playlist(vec![TrackId::new("1")]);
//! let outcome = service.next().await.unwrap();
//! assert_eq!(outcome, NavigationOutcome::Playing { index: 0 });
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread()
//! #         .enable_time()
//! #         .build()
//! #         .unwrap()
//! #         .block_on(f)
//! # }
//! ```

mod backend;
mod cache;
mod controller;
mod decoder;
mod engine;
mod error;
mod events;
mod headless;
mod manager;
pub mod shuffle;
pub mod types;

// Public exports
pub use backend::{AudioBackend, PlatformEventSink, PlayRejection};
pub use cache::{AudioCacheService, AudioResolver, Clock, SystemClock};
pub use controller::{PlayTrackOutcome, PlayerController, TracksController};
pub use decoder::{
    classify, decode_base64, decode_payload, detect_format, is_placeholder, load_encoded,
    AudioFormat, AudioPayload, PayloadKind,
};
pub use engine::{AudioEngine, EngineConfig};
pub use error::{PayloadRejection, PlaybackError, Result};
pub use events::{ChannelObserver, EventObserver, ObserverId, PlatformEvent, PlaybackEvent};
pub use headless::HeadlessBackend;
pub use manager::{NavigationOutcome, PlaybackService};
pub use types::{
    clamp_volume, PlaybackConfig, PlaybackState, PlaybackStatus, PlaylistState, RepeatMode,
    ShuffleMode,
};
