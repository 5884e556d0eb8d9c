//! Headless audio backend
//!
//! Plays nothing. Tracks the state a real audio element would have, so the
//! engine can run without a platform (CLI checks, tests). Platform quirks
//! can be switched on to exercise the engine's recovery paths: autoplay
//! refusal, unsupported formats, slow loads, starved buffers.

use crate::backend::{AudioBackend, PlatformEventSink, PlayRejection};
use crate::decoder::{AudioFormat, AudioPayload};
use crate::events::PlatformEvent;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Reported duration for sources that do not set one
const DEFAULT_DURATION_SECS: f64 = 180.0;

struct Mapping {
    format: AudioFormat,
    bytes: Arc<[u8]>,
}

struct HeadlessState {
    next_url: u64,
    mappings: HashMap<String, Mapping>,
    source: Option<String>,
    paused: bool,
    current_time: f64,
    duration: f64,
    volume: f64,
    muted: bool,
    buffered: bool,

    autoplay_allowed: bool,
    rejected_formats: HashSet<AudioFormat>,
    load_latency: Duration,
    buffer_latency: Duration,
    fail_next_play: Option<String>,
    play_failure: Option<String>,

    events: Option<PlatformEventSink>,

    play_calls: usize,
    pause_calls: usize,
    loaded: Vec<String>,
}

impl Default for HeadlessState {
    fn default() -> Self {
        Self {
            next_url: 0,
            mappings: HashMap::new(),
            source: None,
            paused: true,
            current_time: 0.0,
            duration: DEFAULT_DURATION_SECS,
            volume: 1.0,
            muted: false,
            buffered: false,
            autoplay_allowed: true,
            rejected_formats: HashSet::new(),
            load_latency: Duration::ZERO,
            buffer_latency: Duration::ZERO,
            fail_next_play: None,
            play_failure: None,
            events: None,
            play_calls: 0,
            pause_calls: 0,
            loaded: Vec::new(),
        }
    }
}

/// Backend without audio output
///
/// Cloning shares the underlying state, so a test can keep a handle while
/// the engine owns another.
#[derive(Clone, Default)]
pub struct HeadlessBackend {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Platform behaviour =====

    /// Refuse `play()` until a user gesture (false by default on browsers)
    pub fn set_autoplay_allowed(&self, allowed: bool) {
        self.lock().autoplay_allowed = allowed;
    }

    /// Fail loads of this container, like a browser without the codec
    pub fn reject_format(&self, format: AudioFormat) {
        self.lock().rejected_formats.insert(format);
    }

    /// Delay before a load signals readiness
    pub fn set_load_latency(&self, latency: Duration) {
        self.lock().load_latency = latency;
    }

    /// Whether enough data is buffered for an immediate `play()`
    pub fn set_buffered(&self, buffered: bool) {
        self.lock().buffered = buffered;
    }

    /// Delay before a starved buffer reports readiness again
    pub fn set_buffer_latency(&self, latency: Duration) {
        self.lock().buffer_latency = latency;
    }

    /// Make the next `play()` fail with a media error
    pub fn fail_next_play(&self, reason: impl Into<String>) {
        self.lock().fail_next_play = Some(reason.into());
    }

    /// Fail every `play()` with a media error until cleared
    pub fn set_play_failure(&self, reason: Option<String>) {
        self.lock().play_failure = reason;
    }

    pub fn set_duration(&self, duration: f64) {
        self.lock().duration = duration;
    }

    /// Move the playhead forward, stopping at the end; emits a time update
    pub fn advance(&self, secs: f64) {
        let mut state = self.lock();
        let end = if state.duration.is_finite() {
            state.duration
        } else {
            f64::MAX
        };
        state.current_time = (state.current_time + secs).min(end);
        let time = state.current_time;
        emit(&state, PlatformEvent::TimeUpdate(time));
    }

    /// Play to the end and emit `ended`
    pub fn finish(&self) {
        let mut state = self.lock();
        if state.duration.is_finite() {
            state.current_time = state.duration;
        }
        state.paused = true;
        emit(&state, PlatformEvent::Ended);
    }

    /// Pause without anyone asking and emit `pause`
    pub fn simulate_platform_pause(&self) {
        let mut state = self.lock();
        state.paused = true;
        emit(&state, PlatformEvent::Pause);
    }

    // ===== Inspection =====

    /// Object URLs created and not yet revoked
    pub fn live_object_urls(&self) -> usize {
        self.lock().mappings.len()
    }

    pub fn play_calls(&self) -> usize {
        self.lock().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.lock().pause_calls
    }

    /// Every source that finished loading, oldest first
    pub fn loaded_sources(&self) -> Vec<String> {
        self.lock().loaded.clone()
    }

    pub fn current_source(&self) -> Option<String> {
        self.lock().source.clone()
    }

    /// Bytes behind the current source, if its mapping is still alive
    pub fn current_bytes(&self) -> Option<Vec<u8>> {
        let state = self.lock();
        let source = state.source.as_ref()?;
        state.mappings.get(source).map(|mapping| mapping.bytes.to_vec())
    }

    pub fn is_muted_now(&self) -> bool {
        self.lock().muted
    }
}

/// Push a signal to the attached engine, if any
fn emit(state: &HeadlessState, event: PlatformEvent) {
    if let Some(sink) = &state.events {
        // The engine is gone once its receiver drops.
        let _ = sink.send(event);
    }
}

#[async_trait]
impl AudioBackend for HeadlessBackend {
    fn attach_event_sink(&self, sink: PlatformEventSink) {
        self.lock().events = Some(sink);
    }

    fn create_object_url(&self, payload: &AudioPayload) -> String {
        let mut state = self.lock();
        state.next_url += 1;
        let url = format!("blob:tempo/{}", state.next_url);
        state.mappings.insert(
            url.clone(),
            Mapping {
                format: payload.format(),
                bytes: payload.bytes().into(),
            },
        );
        url
    }

    fn revoke_object_url(&self, url: &str) {
        self.lock().mappings.remove(url);
    }

    async fn load(&self, src: &str) -> Result<(), String> {
        let latency = self.lock().load_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        let format = state
            .mappings
            .get(src)
            .map(|mapping| mapping.format)
            .ok_or_else(|| format!("source {src} was revoked"))?;

        if state.rejected_formats.contains(&format) {
            state.source = None;
            return Err(format!(
                "MEDIA_ERR_SRC_NOT_SUPPORTED: cannot decode {}",
                format.mime_type()
            ));
        }

        state.source = Some(src.to_string());
        state.paused = true;
        state.current_time = 0.0;
        state.buffered = true;
        state.loaded.push(src.to_string());
        Ok(())
    }

    fn clear_source(&self) {
        let mut state = self.lock();
        state.source = None;
        state.paused = true;
        state.current_time = 0.0;
        state.buffered = false;
    }

    fn has_source(&self) -> bool {
        self.lock().source.is_some()
    }

    fn has_enough_data(&self) -> bool {
        let state = self.lock();
        state.source.is_some() && state.buffered
    }

    async fn wait_for_data(&self) -> Result<(), String> {
        let latency = self.lock().buffer_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if state.source.is_none() {
            return Err("no source to buffer".to_string());
        }
        state.buffered = true;
        Ok(())
    }

    async fn play(&self) -> Result<(), PlayRejection> {
        let mut state = self.lock();
        state.play_calls += 1;

        if state.source.is_none() {
            return Err(PlayRejection::Failed("no supported source".to_string()));
        }
        if let Some(reason) = state.fail_next_play.take() {
            return Err(PlayRejection::Failed(reason));
        }
        if let Some(reason) = state.play_failure.clone() {
            return Err(PlayRejection::Failed(reason));
        }
        if !state.autoplay_allowed {
            return Err(PlayRejection::NotAllowed(
                "NotAllowedError: play() requires a user gesture".to_string(),
            ));
        }

        state.paused = false;
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.lock();
        state.pause_calls += 1;
        state.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.lock().current_time
    }

    fn set_current_time(&self, secs: f64) {
        let mut state = self.lock();
        state.current_time = if state.duration.is_finite() {
            secs.min(state.duration)
        } else {
            secs
        };
    }

    fn duration(&self) -> f64 {
        let state = self.lock();
        if state.source.is_some() {
            state.duration
        } else {
            f64::NAN
        }
    }

    fn volume(&self) -> f64 {
        self.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        self.lock().volume = volume;
    }

    fn is_muted(&self) -> bool {
        self.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        self.lock().muted = muted;
    }
}
