//! Audio engine
//!
//! Owns the single platform audio resource and the transient mapping that
//! feeds it. Everything that touches the resource goes through here.
//!
//! Two pieces of bookkeeping matter:
//! - **Load generation**: every `load` bumps a counter; a load that finishes
//!   after a newer one started reports [`PlaybackError::Superseded`] and
//!   leaves the newer source alone.
//! - **Protection window**: some platforms emit a pause right after an
//!   autoplay attempt. Within the window after a successful `play`, an
//!   unrequested platform pause triggers one silent re-play, and explicit
//!   `pause()` calls are ignored. Best-effort only.

use crate::backend::{AudioBackend, PlayRejection};
use crate::decoder::AudioPayload;
use crate::error::{PlaybackError, Result};
use crate::events::{EventObserver, ObserverId, ObserverRegistry, PlatformEvent, PlaybackEvent};
use crate::types::{clamp_volume, PlaybackConfig};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Engine timing knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Spurious-pause protection after `play()`; zero disables it
    pub protection_window: Duration,

    /// Delay before re-playing after a spurious pause
    pub replay_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protection_window: Duration::from_millis(500),
            replay_delay: Duration::from_millis(100),
        }
    }
}

impl From<&PlaybackConfig> for EngineConfig {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            protection_window: config.protection_window(),
            replay_delay: config.replay_delay(),
        }
    }
}

/// Source currently assigned to the resource
#[derive(Debug)]
struct ActiveSource {
    generation: u64,
    object_url: String,
}

struct EngineState {
    initialized: bool,
    generation: u64,
    active: Option<ActiveSource>,

    /// When the last successful `play()` was issued
    last_play: Option<Instant>,

    /// An explicit pause went through since the last play
    pause_requested: bool,

    /// The one silent re-play for this play has been used
    replay_attempted: bool,

    observers: ObserverRegistry,
}

/// Owner of the single platform audio resource
pub struct AudioEngine {
    backend: Box<dyn AudioBackend>,
    config: EngineConfig,
    state: Mutex<EngineState>,
    platform_events: tokio::sync::Mutex<UnboundedReceiver<PlatformEvent>>,
}

impl AudioEngine {
    /// Take ownership of a backend and bring it to an audible default
    pub fn new(backend: Box<dyn AudioBackend>, config: EngineConfig) -> Self {
        backend.set_volume(1.0);
        backend.set_muted(false);

        let (sink, platform_events) = mpsc::unbounded_channel();
        backend.attach_event_sink(sink);

        Self {
            backend,
            config,
            platform_events: tokio::sync::Mutex::new(platform_events),
            state: Mutex::new(EngineState {
                initialized: true,
                generation: 0,
                active: None,
                last_play: None,
                pause_requested: false,
                replay_attempted: false,
                observers: ObserverRegistry::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_initialized(&self) -> Result<MutexGuard<'_, EngineState>> {
        let state = self.lock();
        if state.initialized {
            Ok(state)
        } else {
            Err(PlaybackError::EngineNotInitialized)
        }
    }

    fn within_protection_window(&self, state: &EngineState) -> bool {
        state
            .last_play
            .is_some_and(|at| at.elapsed() < self.config.protection_window)
    }

    // ===== Source =====

    /// Load a validated payload, replacing whatever was loaded before
    ///
    /// The previous mapping is revoked before the new one is created, so at
    /// most one mapping is ever alive. Resolves once the platform can play
    /// the source.
    pub async fn load(&self, payload: &AudioPayload) -> Result<()> {
        let (generation, object_url) = {
            let mut state = self.lock_initialized()?;

            if !self.backend.is_paused() {
                self.backend.pause();
            }

            state.generation += 1;
            if let Some(previous) = state.active.take() {
                self.backend.revoke_object_url(&previous.object_url);
            }

            let object_url = self.backend.create_object_url(payload);
            state.active = Some(ActiveSource {
                generation: state.generation,
                object_url: object_url.clone(),
            });

            // A fresh load closes any protection window left by the last play.
            state.last_play = None;
            state.pause_requested = false;

            (state.generation, object_url)
        };

        debug!(
            generation,
            format = ?payload.format(),
            size = payload.len(),
            "Loading audio source"
        );

        let outcome = self.backend.load(&object_url).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!(
                generation,
                current = state.generation,
                "Ignoring completion of superseded load"
            );
            return Err(PlaybackError::Superseded);
        }

        match outcome {
            Ok(()) => {
                info!(generation, "Audio source ready");
                Ok(())
            }
            Err(reason) => {
                warn!(generation, %reason, "Audio source failed to load");
                if let Some(active) = state.active.take() {
                    self.backend.revoke_object_url(&active.object_url);
                }
                self.backend.clear_source();
                Err(PlaybackError::LoadFailed(reason))
            }
        }
    }

    /// Detach the current source and revoke its mapping
    ///
    /// Any load still in flight completes as superseded.
    pub fn unload(&self) -> Result<()> {
        let mut state = self.lock_initialized()?;

        if !self.backend.is_paused() {
            self.backend.pause();
        }

        state.generation += 1;
        if let Some(active) = state.active.take() {
            self.backend.revoke_object_url(&active.object_url);
        }
        self.backend.clear_source();
        state.last_play = None;
        state.pause_requested = false;

        debug!(generation = state.generation, "Audio source unloaded");
        Ok(())
    }

    /// Generation of the most recent load (0 before the first)
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Whether the resource has a source assigned
    pub fn has_source(&self) -> bool {
        self.lock().active.is_some() && self.backend.has_source()
    }

    // ===== Transport =====

    /// Start playback
    ///
    /// Waits for one readiness signal if buffering is insufficient, then
    /// tries once. Autoplay refusals come back as
    /// [`PlaybackError::PlaybackBlocked`].
    pub async fn play(&self) -> Result<()> {
        let generation = {
            let state = self.lock_initialized()?;
            if state.active.is_none() || !self.backend.has_source() {
                return Err(PlaybackError::NoAudioSource);
            }

            if self.backend.volume() <= 0.0 {
                self.backend.set_volume(1.0);
            }
            if self.backend.is_muted() {
                self.backend.set_muted(false);
            }
            state.generation
        };

        if !self.backend.has_enough_data() {
            debug!(generation, "Waiting for buffered data before playing");
            self.backend
                .wait_for_data()
                .await
                .map_err(PlaybackError::LoadFailed)?;

            if self.lock_initialized()?.generation != generation {
                return Err(PlaybackError::Superseded);
            }
        }

        {
            let mut state = self.lock();
            state.last_play = Some(Instant::now());
            state.pause_requested = false;
            state.replay_attempted = false;
        }

        match self.backend.play().await {
            Ok(()) => {
                debug!(generation, "Playback started");
                Ok(())
            }
            Err(rejection) => {
                self.lock().last_play = None;
                match rejection {
                    PlayRejection::NotAllowed(reason) => {
                        warn!(%reason, "Playback blocked, waiting for user gesture");
                        Err(PlaybackError::PlaybackBlocked(reason))
                    }
                    PlayRejection::Failed(reason) => {
                        warn!(%reason, "Playback failed");
                        Err(PlaybackError::PlayFailed(reason))
                    }
                }
            }
        }
    }

    /// Pause playback
    ///
    /// No-op when already paused, and ignored inside the protection window.
    pub fn pause(&self) -> Result<()> {
        let mut state = self.lock_initialized()?;

        if self.backend.is_paused() {
            return Ok(());
        }

        if self.within_protection_window(&state) {
            debug!("Pause suppressed inside protection window");
            return Ok(());
        }

        state.pause_requested = true;
        self.backend.pause();
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.backend.is_paused()
    }

    // ===== Position & Volume =====

    /// Seek to a position in seconds (negative positions clamp to 0)
    pub fn seek(&self, time: f64) -> Result<()> {
        let _state = self.lock_initialized()?;
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        self.backend.set_current_time(time);
        Ok(())
    }

    /// Set volume, clamped to [0, 1]; returns the applied value
    pub fn set_volume(&self, volume: f64) -> Result<f64> {
        let _state = self.lock_initialized()?;
        let volume = clamp_volume(volume);
        self.backend.set_volume(volume);
        Ok(volume)
    }

    pub fn volume(&self) -> f64 {
        finite_or_zero(self.backend.volume())
    }

    /// Current position in seconds (0 when unknown)
    pub fn current_time(&self) -> f64 {
        finite_or_zero(self.backend.current_time())
    }

    /// Duration in seconds (0 when unknown)
    pub fn duration(&self) -> f64 {
        finite_or_zero(self.backend.duration())
    }

    // ===== Events =====

    /// Register an observer for [`PlaybackEvent`]s
    pub fn subscribe(&self, observer: Arc<dyn EventObserver>) -> ObserverId {
        self.lock().observers.subscribe(observer)
    }

    /// Remove an observer; `false` if it was not registered
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.lock().observers.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Feed a signal from the platform resource into the engine
    ///
    /// Translates it into a [`PlaybackEvent`] for observers. Pause signals
    /// are not published; they only drive the protection window.
    pub async fn handle_platform_event(&self, event: PlatformEvent) {
        let published = match event {
            PlatformEvent::DurationChange(duration) => PlaybackEvent::DurationChange {
                duration: finite_or_zero(duration),
            },
            PlatformEvent::CanPlay => PlaybackEvent::CanPlay,
            PlatformEvent::TimeUpdate(time) => PlaybackEvent::TimeUpdate {
                current_time: finite_or_zero(time),
            },
            PlatformEvent::Ended => PlaybackEvent::Ended,
            PlatformEvent::Error(message) => {
                warn!(%message, "Audio resource reported an error");
                PlaybackEvent::Error { message }
            }
            PlatformEvent::Pause => {
                self.handle_platform_pause().await;
                return;
            }
        };

        self.dispatch(&published);
    }

    /// Handle every signal the backend has pushed so far; returns how many
    pub async fn pump_platform_events(&self) -> usize {
        let mut receiver = self.platform_events.lock().await;
        let mut handled = 0;
        while let Ok(event) = receiver.try_recv() {
            self.handle_platform_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Wait for the next signal the backend pushes
    ///
    /// `None` once the backend has dropped its sink. Cancel-safe; the caller
    /// hands the signal to [`handle_platform_event`](Self::handle_platform_event).
    pub async fn next_platform_event(&self) -> Option<PlatformEvent> {
        self.platform_events.lock().await.recv().await
    }

    fn dispatch(&self, event: &PlaybackEvent) {
        let observers = {
            let state = self.lock();
            if !state.initialized {
                return;
            }
            state.observers.snapshot()
        };
        for observer in observers {
            observer.on_event(event);
        }
    }

    async fn handle_platform_pause(&self) {
        let generation = {
            let mut state = self.lock();
            if !state.initialized
                || state.pause_requested
                || state.replay_attempted
                || !self.within_protection_window(&state)
            {
                return;
            }
            state.replay_attempted = true;
            state.generation
        };

        warn!("Unrequested pause inside protection window, retrying playback");
        tokio::time::sleep(self.config.replay_delay).await;

        {
            let state = self.lock();
            if !state.initialized || state.generation != generation || state.pause_requested {
                return;
            }
        }

        if self.backend.is_paused() {
            if let Err(rejection) = self.backend.play().await {
                debug!(?rejection, "Silent re-play after spurious pause failed");
            }
        }
    }

    // ===== Teardown =====

    /// Release the resource, revoke the mapping and drop all observers
    ///
    /// Any load still in flight completes as superseded. Every later call
    /// fails with [`PlaybackError::EngineNotInitialized`].
    pub fn destroy(&self) {
        let mut state = self.lock();
        if !state.initialized {
            return;
        }

        self.backend.pause();
        self.backend.clear_source();
        if let Some(active) = state.active.take() {
            self.backend.revoke_object_url(&active.object_url);
        }
        state.observers.clear();
        state.generation += 1;
        state.last_play = None;
        state.initialized = false;
        info!("Audio engine destroyed");
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
