//! Playback service - playlist navigation and transport state
//!
//! Coordinates the track store, payload validation, the audio cache and the
//! engine. One instance per player; it subscribes to the engine on
//! construction and unsubscribes on [`PlaybackService::shutdown`].

use crate::{
    backend::AudioBackend,
    cache::AudioCacheService,
    decoder::{decode_payload, AudioPayload},
    engine::{AudioEngine, EngineConfig},
    error::{PlaybackError, Result},
    events::{ChannelObserver, ObserverId, PlaybackEvent},
    shuffle::{pick_untried, random_index_excluding},
    types::{
        PlaybackConfig, PlaybackState, PlaybackStatus, PlaylistState, RepeatMode, ShuffleMode,
    },
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempo_core::{Track, TrackId, TrackStore};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

/// How a navigation request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Empty playlist, nothing to do
    Idle,

    /// Playing the track at `index`
    Playing { index: usize },

    /// Track at `index` is loaded; the platform wants a user gesture
    AwaitingGesture { index: usize },

    /// End of playlist reached with repeat off; playback stopped
    Stopped,

    /// Every candidate failed; playback stopped
    Exhausted {
        attempts: usize,
        last_error: Option<String>,
    },

    /// A newer selection took over while this one was loading
    Superseded,
}

/// Result of trying a single playlist entry
enum Attempt {
    Done(NavigationOutcome),
    Unplayable(PlaybackError),
}

struct PlayerState {
    playlist: PlaylistState,
    status: PlaybackStatus,

    /// Bumped by every `select_track`
    selection: u64,
    loading: bool,
}

/// Playlist navigation and transport state over an [`AudioEngine`]
pub struct PlaybackService {
    engine: Arc<AudioEngine>,
    tracks: Arc<TrackStore>,
    cache: Option<Arc<AudioCacheService>>,
    config: PlaybackConfig,
    state: Mutex<PlayerState>,
    rng: Mutex<StdRng>,
    subscription: Mutex<Option<ObserverId>>,
    events: tokio::sync::Mutex<UnboundedReceiver<PlaybackEvent>>,
}

impl PlaybackService {
    /// Create a service over an existing engine
    ///
    /// Applies the configured initial volume and subscribes to engine events.
    pub fn new(
        engine: Arc<AudioEngine>,
        tracks: Arc<TrackStore>,
        config: PlaybackConfig,
    ) -> Result<Self> {
        let mut status = PlaybackStatus::from_config(&config);
        status.volume = engine.set_volume(config.volume)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = engine.subscribe(Arc::new(ChannelObserver::new(sender)));

        let rng = config
            .shuffle_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            engine,
            tracks,
            cache: None,
            config,
            state: Mutex::new(PlayerState {
                playlist: PlaylistState::default(),
                status,
                selection: 0,
                loading: false,
            }),
            rng: Mutex::new(rng),
            subscription: Mutex::new(Some(subscription)),
            events: tokio::sync::Mutex::new(receiver),
        })
    }

    /// Create a service that owns a fresh engine over `backend`
    pub fn with_backend(
        backend: Box<dyn AudioBackend>,
        tracks: Arc<TrackStore>,
        config: PlaybackConfig,
    ) -> Result<Self> {
        let engine = Arc::new(AudioEngine::new(backend, EngineConfig::from(&config)));
        Self::new(engine, tracks, config)
    }

    /// Resolve payloads that fail validation through `cache`
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<AudioCacheService>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_playing(&self, playing: bool) {
        self.lock().status.is_playing = playing;
    }

    pub fn engine(&self) -> &Arc<AudioEngine> {
        &self.engine
    }

    pub fn tracks(&self) -> &Arc<TrackStore> {
        &self.tracks
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    // ===== Playlist =====

    /// Replace the playlist; the current index is kept if it still fits
    pub fn set_playlist(&self, tracks: Vec<TrackId>) {
        let mut state = self.lock();
        state.playlist.set_tracks(tracks);
        debug!(
            len = state.playlist.len(),
            current = ?state.playlist.current_index(),
            "Playlist replaced"
        );
    }

    /// Point at a playlist entry without loading it
    pub fn set_current_index(&self, index: Option<usize>) -> Result<()> {
        let mut state = self.lock();
        if state.playlist.select(index) {
            Ok(())
        } else {
            Err(PlaybackError::IndexOutOfBounds(index.unwrap_or_default()))
        }
    }

    pub fn playlist(&self) -> PlaylistState {
        self.lock().playlist.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.lock().playlist.current_index()
    }

    // ===== Status =====

    pub fn status(&self) -> PlaybackStatus {
        self.lock().status.clone()
    }

    /// Transport state derived from the status
    pub fn state(&self) -> PlaybackState {
        let state = self.lock();
        if state.status.current_track_id.is_none() {
            PlaybackState::Idle
        } else if state.loading {
            PlaybackState::Loading
        } else if state.status.is_playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock().status.is_playing
    }

    // ===== Track selection =====

    /// Make `id` the current track and load its audio
    ///
    /// The track id is published before the load finishes. A newer call
    /// supersedes this one, which then returns [`PlaybackError::Superseded`].
    pub async fn select_track(&self, id: &TrackId) -> Result<()> {
        let track = self
            .tracks
            .get(id)
            .ok_or_else(|| PlaybackError::TrackNotFound(id.clone()))?;

        let ticket = {
            let mut state = self.lock();
            state.selection += 1;
            state.loading = true;
            state.status.current_track_id = Some(id.clone());
            state.status.current_time = 0.0;
            state.status.duration = track.duration_secs.unwrap_or(0.0).max(0.0);

            let points_elsewhere = state
                .playlist
                .current_index()
                .and_then(|index| state.playlist.track_at(index))
                != Some(id);
            if points_elsewhere {
                if let Some(index) = state.playlist.position_of(id) {
                    state.playlist.select(Some(index));
                }
            }
            state.selection
        };

        info!(track_id = %id, title = %track.title, "Selecting track");

        let outcome = match self.resolve_payload(&track).await {
            Ok(payload) => self.engine.load(&payload).await,
            Err(e) => Err(e),
        };

        let mut state = self.lock();
        if state.selection != ticket {
            return Err(PlaybackError::Superseded);
        }
        state.loading = false;

        match outcome {
            Ok(()) => {
                let duration = self.engine.duration();
                if duration > 0.0 {
                    state.status.duration = duration;
                }
                Ok(())
            }
            Err(e) => {
                state.status.is_playing = false;
                warn!(track_id = %id, error = %e, "Track is unplayable");
                Err(e)
            }
        }
    }

    /// Alias matching the external `set_current_track` operation
    pub async fn set_current_track(&self, id: &TrackId) -> Result<()> {
        self.select_track(id).await
    }

    /// Validated payload for a track
    ///
    /// The inline payload is tried first; when it does not validate and a
    /// cache is attached, it is used as a key for the full payload.
    async fn resolve_payload(&self, track: &Track) -> Result<AudioPayload> {
        let inline = track.encoded_audio.as_deref().filter(|s| !s.is_empty());

        let Some(cache) = &self.cache else {
            let encoded = inline.ok_or(PlaybackError::NoAudioSource)?;
            return decode_payload(encoded);
        };

        let key = match inline {
            Some(encoded) => match decode_payload(encoded) {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    debug!(track_id = %track.id, error = %e, "Inline payload invalid, resolving through cache");
                    encoded
                }
            },
            None => track.id.as_str(),
        };

        let full = cache.get_full_audio(key).await;
        decode_payload(&full)
    }

    // ===== Transport =====

    /// Start playback of the loaded track
    pub async fn play(&self) -> Result<()> {
        match self.engine.play().await {
            Ok(()) => {
                self.set_playing(true);
                Ok(())
            }
            Err(e) => {
                self.set_playing(false);
                Err(e)
            }
        }
    }

    /// Pause; the status reports not playing even if the engine ignored it
    pub fn pause(&self) -> Result<()> {
        let result = self.engine.pause();
        self.set_playing(false);
        result
    }

    pub fn seek(&self, time: f64) -> Result<()> {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        self.engine.seek(time)?;
        self.lock().status.current_time = time;
        Ok(())
    }

    /// Set volume (clamped to [0, 1]); returns the applied value
    pub fn set_volume(&self, volume: f64) -> Result<f64> {
        let applied = self.engine.set_volume(volume)?;
        self.lock().status.volume = applied;
        Ok(applied)
    }

    /// Cycle none → all → one → none
    pub fn toggle_repeat(&self) -> RepeatMode {
        let mut state = self.lock();
        state.status.repeat = state.status.repeat.cycle();
        state.status.repeat
    }

    pub fn toggle_shuffle(&self) -> ShuffleMode {
        let mut state = self.lock();
        state.status.shuffle = state.status.shuffle.toggled();
        state.status.shuffle
    }

    pub fn skip_forward(&self) -> Result<()> {
        self.seek(self.engine.current_time() + self.config.skip_step_secs)
    }

    pub fn skip_backward(&self) -> Result<()> {
        self.seek((self.engine.current_time() - self.config.skip_step_secs).max(0.0))
    }

    // ===== Navigation =====

    /// Select, load and play one playlist entry
    async fn attempt(&self, index: usize) -> Result<Attempt> {
        let id = {
            let mut state = self.lock();
            state.playlist.select(Some(index));
            state.playlist.track_at(index).cloned()
        };
        let Some(id) = id else {
            return Err(PlaybackError::IndexOutOfBounds(index));
        };

        let result = match self.select_track(&id).await {
            Ok(()) => self.play().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(Attempt::Done(NavigationOutcome::Playing { index })),
            Err(PlaybackError::Superseded) => Ok(Attempt::Done(NavigationOutcome::Superseded)),
            Err(e) if e.is_blocked() => {
                Ok(Attempt::Done(NavigationOutcome::AwaitingGesture { index }))
            }
            Err(e) if e.is_unplayable() => {
                warn!(index, track_id = %id, error = %e, "Skipping unplayable track");
                Ok(Attempt::Unplayable(e))
            }
            Err(e) => Err(e),
        }
    }

    fn give_up(&self, attempts: usize, last_error: Option<&PlaybackError>) -> NavigationOutcome {
        self.set_playing(false);
        if let Err(e) = self.engine.unload() {
            debug!(error = %e, "Unloading after exhausted playlist failed");
        }
        warn!(attempts, "No playable track found, stopping");
        NavigationOutcome::Exhausted {
            attempts,
            last_error: last_error.map(ToString::to_string),
        }
    }

    /// Advance to the next playable entry
    ///
    /// Tries at most one pass over the playlist, skipping entries that fail
    /// to resolve, validate or load.
    pub async fn next(&self) -> Result<NavigationOutcome> {
        let (len, start, shuffle) = {
            let state = self.lock();
            (
                state.playlist.len(),
                state.playlist.current_index(),
                state.status.shuffle,
            )
        };
        if len == 0 {
            return Ok(NavigationOutcome::Idle);
        }

        let mut tried = HashSet::new();
        let mut last_error = None;

        for step in 0..len {
            let candidate = if shuffle.is_on() {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                match pick_untried(&mut *rng, len, start, &tried) {
                    Some(index) => index,
                    None => break,
                }
            } else {
                (start.map_or(0, |s| s + 1) + step) % len
            };
            tried.insert(candidate);

            match self.attempt(candidate).await? {
                Attempt::Done(outcome) => return Ok(outcome),
                Attempt::Unplayable(e) => last_error = Some(e),
            }
        }

        Ok(self.give_up(tried.len(), last_error.as_ref()))
    }

    /// Step back one entry
    ///
    /// In order: wraps from the first entry to the last, no retry. Shuffled:
    /// a random entry other than the current one, with a single retry on a
    /// different entry if it fails.
    pub async fn previous(&self) -> Result<NavigationOutcome> {
        let (len, current, shuffle) = {
            let state = self.lock();
            (
                state.playlist.len(),
                state.playlist.current_index(),
                state.status.shuffle,
            )
        };
        if len == 0 {
            return Ok(NavigationOutcome::Idle);
        }

        if !shuffle.is_on() {
            let index = match current {
                None | Some(0) => len - 1,
                Some(index) => index - 1,
            };
            return match self.attempt(index).await? {
                Attempt::Done(outcome) => Ok(outcome),
                Attempt::Unplayable(e) => Ok(self.give_up(1, Some(&e))),
            };
        }

        let exclude: Vec<usize> = current.into_iter().collect();
        let Some(first) = self.random_index(len, &exclude) else {
            return Ok(NavigationOutcome::Idle);
        };
        let first_error = match self.attempt(first).await? {
            Attempt::Done(outcome) => return Ok(outcome),
            Attempt::Unplayable(e) => e,
        };

        let mut exclude = exclude;
        exclude.push(first);
        let Some(alternate) = self.random_index(len, &exclude).filter(|i| *i != first) else {
            return Ok(self.give_up(1, Some(&first_error)));
        };
        match self.attempt(alternate).await? {
            Attempt::Done(outcome) => Ok(outcome),
            Attempt::Unplayable(e) => Ok(self.give_up(2, Some(&e))),
        }
    }

    fn random_index(&self, len: usize, exclude: &[usize]) -> Option<usize> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        random_index_excluding(&mut *rng, len, exclude)
    }

    /// React to the current track finishing
    pub async fn handle_ended(&self) -> Result<NavigationOutcome> {
        let (repeat, at_last, current) = {
            let state = self.lock();
            (
                state.status.repeat,
                state.playlist.is_at_last(),
                state.playlist.current_index(),
            )
        };

        match repeat {
            RepeatMode::One => {
                self.engine.seek(0.0)?;
                self.lock().status.current_time = 0.0;
                match self.play().await {
                    Ok(()) => Ok(current.map_or(NavigationOutcome::Idle, |index| {
                        NavigationOutcome::Playing { index }
                    })),
                    Err(e) if e.is_blocked() => Ok(current.map_or(NavigationOutcome::Idle, |index| {
                        NavigationOutcome::AwaitingGesture { index }
                    })),
                    Err(e) => {
                        debug!(error = %e, "Repeat-one replay failed");
                        Ok(self.give_up(1, Some(&e)))
                    }
                }
            }
            RepeatMode::All => self.next().await,
            RepeatMode::Off if at_last => {
                if let Err(e) = self.pause() {
                    debug!(error = %e, "Pause at end of playlist failed");
                }
                info!("End of playlist reached");
                Ok(NavigationOutcome::Stopped)
            }
            RepeatMode::Off => self.next().await,
        }
    }

    // ===== Engine events =====

    async fn apply_event(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::TimeUpdate { current_time } => {
                self.lock().status.current_time = current_time.max(0.0);
            }
            PlaybackEvent::DurationChange { duration } => {
                self.lock().status.duration = duration.max(0.0);
            }
            PlaybackEvent::Ended => {
                if let Err(e) = self.handle_ended().await {
                    warn!(error = %e, "Handling end of track failed");
                }
            }
            PlaybackEvent::Error { message } => {
                warn!(%message, "Engine reported a playback error");
            }
            PlaybackEvent::CanPlay => {}
        }
    }

    /// Apply every engine event queued so far; returns how many
    ///
    /// Platform signals the backend has pushed are handled first, so their
    /// engine events are included.
    pub async fn pump_events(&self) -> usize {
        self.engine.pump_platform_events().await;
        let mut receiver = self.events.lock().await;
        let mut applied = 0;
        while let Ok(event) = receiver.try_recv() {
            self.apply_event(event).await;
            applied += 1;
        }
        applied
    }

    /// Apply engine events until the service shuts down
    ///
    /// Also handles the platform signals the backend pushes, so an `ended`
    /// from the resource moves the playlist on without outside help.
    pub async fn run_events(&self) {
        let mut receiver = self.events.lock().await;
        let mut platform_open = true;
        loop {
            tokio::select! {
                event = receiver.recv() => match event {
                    Some(event) => self.apply_event(event).await,
                    None => break,
                },
                signal = self.engine.next_platform_event(), if platform_open => match signal {
                    Some(signal) => self.engine.handle_platform_event(signal).await,
                    None => platform_open = false,
                },
            }
        }
        debug!("Engine event stream closed");
    }

    /// Unsubscribe from the engine and destroy it
    pub fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.engine.unsubscribe(id);
        }
        self.engine.destroy();
        self.set_playing(false);
        info!("Playback service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use base64::Engine as _;
    use tempo_core::Track;

    fn encoded(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn service_with(tracks: Vec<Track>) -> (PlaybackService, HeadlessBackend) {
        let backend = HeadlessBackend::new();
        let ids = tracks.iter().map(|t| t.id.clone()).collect();
        let store = Arc::new(TrackStore::with_tracks(tracks));
        let config = PlaybackConfig {
            shuffle_seed: Some(11),
            ..PlaybackConfig::default()
        };
        let service =
            PlaybackService::with_backend(Box::new(backend.clone()), store, config).unwrap();
        service.set_playlist(ids);
        (service, backend)
    }

    fn good(id: &str) -> Track {
        Track::new(id, id, "artist").with_audio(encoded(format!("ID3\x04{id}").as_bytes()))
    }

    fn placeholder(id: &str) -> Track {
        Track::new(id, id, "artist").with_audio(encoded(format!("Audio data for {id}").as_bytes()))
    }

    #[tokio::test(start_paused = true)]
    async fn selection_publishes_id_before_load() {
        let (service, backend) = service_with(vec![good("a")]);
        backend.set_load_latency(std::time::Duration::from_millis(50));

        let track_a = TrackId::new("a");
        let select = service.select_track(&track_a);
        tokio::pin!(select);
        tokio::select! {
            biased;
            _ = &mut select => panic!("load finished too early"),
            () = tokio::time::sleep(std::time::Duration::from_millis(10)) => {}
        }
        assert_eq!(service.status().current_track_id, Some(TrackId::new("a")));
        assert_eq!(service.state(), PlaybackState::Loading);

        select.await.unwrap();
        assert_eq!(service.state(), PlaybackState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_never_reaches_engine() {
        let (service, backend) = service_with(vec![placeholder("a")]);
        let err = service.select_track(&TrackId::new("a")).await.unwrap_err();
        assert!(err.is_unplayable());
        assert!(backend.loaded_sources().is_empty());
        assert_eq!(backend.live_object_urls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_payload_is_no_audio_source() {
        let (service, _) = service_with(vec![Track::new("a", "A", "artist")]);
        assert!(matches!(
            service.select_track(&TrackId::new("a")).await,
            Err(PlaybackError::NoAudioSource)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn play_failure_clears_playing_flag() {
        let (service, backend) = service_with(vec![good("a")]);
        service.select_track(&TrackId::new("a")).await.unwrap();
        service.play().await.unwrap();
        assert!(service.is_playing());

        backend.fail_next_play("decode");
        assert!(matches!(service.play().await, Err(PlaybackError::PlayFailed(_))));
        assert!(!service.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_always_reports_not_playing() {
        let (service, _) = service_with(vec![good("a")]);
        service.select_track(&TrackId::new("a")).await.unwrap();
        service.play().await.unwrap();

        // Inside the protection window the engine keeps playing.
        service.pause().unwrap();
        assert!(!service.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn previous_wraps_to_last() {
        let (service, _) = service_with(vec![good("a"), good("b"), good("c")]);
        service.set_current_index(Some(0)).unwrap();
        assert_eq!(
            service.previous().await.unwrap(),
            NavigationOutcome::Playing { index: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn set_current_index_rejects_out_of_bounds() {
        let (service, _) = service_with(vec![good("a")]);
        assert!(matches!(
            service.set_current_index(Some(3)),
            Err(PlaybackError::IndexOutOfBounds(3))
        ));
        service.set_current_index(None).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn skip_backward_clamps_at_zero() {
        let (service, _) = service_with(vec![good("a")]);
        service.select_track(&TrackId::new("a")).await.unwrap();
        service.seek(4.0).unwrap();
        service.skip_backward().unwrap();
        assert_eq!(service.status().current_time, 0.0);

        service.skip_forward().unwrap();
        assert_eq!(service.status().current_time, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_detaches_from_engine() {
        let (service, backend) = service_with(vec![good("a")]);
        service.select_track(&TrackId::new("a")).await.unwrap();
        assert_eq!(service.engine().observer_count(), 1);

        service.shutdown();
        assert!(!service.engine().is_initialized());
        assert_eq!(backend.live_object_urls(), 0);
    }
}
