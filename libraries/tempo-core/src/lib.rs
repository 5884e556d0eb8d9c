//! Tempo Core
//!
//! Platform-agnostic track types and the metadata boundary used by the
//! playback core.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`
//! - **Core Traits**: `TrackProvider` (where track metadata comes from)
//! - **Track Store**: `TrackStore`, the in-memory catalogue the player reads by id
//! - **Error Handling**: `CoreError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use tempo_core::{Track, TrackId, TrackStore};
//!
//! let store = TrackStore::new();
//! store.replace_tracks(vec![Track::new("1", "Intro", "Artist")]);
//!
//! let track = store.get(&TrackId::new("1")).unwrap();
//! assert_eq!(track.title, "Intro");
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{CoreError, Result};
pub use store::TrackStore;
pub use traits::TrackProvider;
pub use types::{Track, TrackId};
