//! Platform-agnostic audio resource trait
//!
//! Abstracts the one playable audio element a platform offers (a browser
//! `<audio>` element, a native player handle, a headless stand-in).

use crate::decoder::AudioPayload;
use crate::events::PlatformEvent;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

/// Where a backend pushes the signals its resource emits
pub type PlatformEventSink = UnboundedSender<PlatformEvent>;

/// Why the platform refused to start playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayRejection {
    /// Autoplay policy: playback needs a user gesture first
    NotAllowed(String),

    /// Any other refusal (decode error, aborted, unsupported source)
    Failed(String),
}

/// Platform audio resource
///
/// Methods take `&self`: platform handles are shared objects with their own
/// interior state, and the engine serialises access to them.
///
/// Implementors only report what the platform does. Protection windows,
/// mapping lifetime and stale-load detection live in
/// [`AudioEngine`](crate::AudioEngine).
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Receive the sink for platform signals (ended, pause, timeupdate...)
    ///
    /// Called once by [`AudioEngine::new`](crate::AudioEngine::new).
    /// Backends that cannot observe their resource keep the default.
    fn attach_event_sink(&self, _sink: PlatformEventSink) {}

    /// Create a transient mapping (object URL) for in-memory audio
    fn create_object_url(&self, payload: &AudioPayload) -> String;

    /// Release a mapping created by `create_object_url`
    fn revoke_object_url(&self, url: &str);

    /// Assign `src` and wait until the platform can play it
    ///
    /// # Returns
    /// * `Ok(())` - Enough data buffered (canplay)
    /// * `Err(reason)` - Media error while loading
    async fn load(&self, src: &str) -> Result<(), String>;

    /// Detach the current source
    fn clear_source(&self);

    /// Whether a source is assigned
    fn has_source(&self) -> bool;

    /// Whether enough data is buffered to start playing right away
    fn has_enough_data(&self) -> bool;

    /// Wait for the next readiness signal
    async fn wait_for_data(&self) -> Result<(), String>;

    /// Start playback
    async fn play(&self) -> Result<(), PlayRejection>;

    /// Pause playback
    fn pause(&self);

    fn is_paused(&self) -> bool;

    /// Current position in seconds (may be NaN before metadata)
    fn current_time(&self) -> f64;

    fn set_current_time(&self, secs: f64);

    /// Duration in seconds (may be NaN before metadata)
    fn duration(&self) -> f64;

    fn volume(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);
}
