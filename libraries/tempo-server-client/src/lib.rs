//! HTTP client for the Tempo music API.
//!
//! Provides:
//! - Track and favorites listing (`GET /tracks`, `GET /favorites`)
//! - Favorite add/remove (`POST` / `DELETE /favorites`)
//! - Bearer-token authentication
//! - Audio resolvers that plug into `tempo_playback::AudioCacheService`
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tempo_playback::AudioCacheService;
//! use tempo_server_client::{PrimaryAudioResolver, SecondaryAudioResolver, ServerConfig, TempoServerClient};
//!
//! let client = TempoServerClient::new(ServerConfig::new("http://localhost:8000/api"))?;
//! let cache = AudioCacheService::new(Duration::from_secs(24 * 60 * 60))
//!     .with_strategy(PrimaryAudioResolver::new(client.clone()))
//!     .with_strategy(SecondaryAudioResolver::new(client.clone()));
//!
//! let audio = cache.get_full_audio("track-17").await;
//! ```

mod audio;
mod client;
mod error;
pub mod types;

pub use audio::{PrimaryAudioResolver, SecondaryAudioResolver};
pub use client::TempoServerClient;
pub use error::{Result, ServerClientError};
pub use types::{FavoriteRequest, MessageResponse, ServerConfig, TrackResponse, WireId};
