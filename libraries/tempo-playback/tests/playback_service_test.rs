//! Playlist navigation end to end
//!
//! Drives `PlaybackService` and the controllers over the headless backend:
//! - next/previous arithmetic and skip-on-failure
//! - shuffle exclusion
//! - repeat modes on `ended`
//! - cache-backed payload resolution
//! - superseded selections
//! - play_track entry point

use async_trait::async_trait;
use base64::Engine as _;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{Track, TrackId, TrackStore};
use tempo_playback::{
    AudioBackend, AudioCacheService, AudioResolver, HeadlessBackend, NavigationOutcome, PlatformEvent,
    PlayTrackOutcome, PlaybackConfig, PlaybackError, PlaybackService, PlaybackState,
    PlayerController, RepeatMode, Result, ShuffleMode, TracksController,
};

// ============================================================================
// Test Infrastructure
// ============================================================================

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Track whose payload is a tagged MP3 header carrying its id
fn good(id: &str) -> Track {
    Track::new(id, format!("Track {id}"), "Artist")
        .with_audio(encode(format!("ID3\x04{id}").as_bytes()))
}

/// Track whose payload is the server's text placeholder
fn placeholder(id: &str) -> Track {
    Track::new(id, format!("Track {id}"), "Artist")
        .with_audio(encode(format!("Audio data for {id}").as_bytes()))
}

fn ids(tracks: &[Track]) -> Vec<TrackId> {
    tracks.iter().map(|t| t.id.clone()).collect()
}

struct Harness {
    service: Arc<PlaybackService>,
    backend: HeadlessBackend,
}

impl Harness {
    fn new(tracks: Vec<Track>) -> Self {
        Self::with_config(tracks, PlaybackConfig::default())
    }

    fn with_config(tracks: Vec<Track>, config: PlaybackConfig) -> Self {
        let playlist = ids(&tracks);
        let backend = HeadlessBackend::new();
        let store = Arc::new(TrackStore::with_tracks(tracks));
        let config = PlaybackConfig {
            shuffle_seed: Some(2024),
            ..config
        };
        let service = PlaybackService::with_backend(Box::new(backend.clone()), store, config)
            .expect("service");
        service.set_playlist(playlist);
        Self {
            service: Arc::new(service),
            backend,
        }
    }

    fn playing_bytes(&self) -> Vec<u8> {
        self.backend.current_bytes().expect("a loaded source")
    }
}

/// Resolver serving fixed payloads by key
struct MapResolver {
    payloads: HashMap<String, String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl AudioResolver for MapResolver {
    fn name(&self) -> &str {
        "map"
    }

    async fn resolve(&self, key: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .get(key)
            .cloned()
            .ok_or_else(|| PlaybackError::NetworkFetchFailed(format!("404 for {key}")))
    }
}

// ============================================================================
// next()
// ============================================================================

#[tokio::test(start_paused = true)]
async fn next_on_empty_playlist_is_noop() {
    let h = Harness::new(vec![]);
    assert_eq!(h.service.next().await.unwrap(), NavigationOutcome::Idle);
    assert_eq!(h.service.current_index(), None);
    assert!(h.backend.loaded_sources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn next_advances_and_wraps() {
    let h = Harness::new(vec![good("a"), good("b"), good("c")]);
    h.service.set_current_index(Some(1)).unwrap();

    assert_eq!(h.service.next().await.unwrap(), NavigationOutcome::Playing { index: 2 });
    assert_eq!(h.service.next().await.unwrap(), NavigationOutcome::Playing { index: 0 });
    assert_eq!(h.playing_bytes(), b"ID3\x04a");
}

#[tokio::test(start_paused = true)]
async fn next_without_selection_starts_at_first() {
    let h = Harness::new(vec![good("a"), good("b")]);
    assert_eq!(h.service.next().await.unwrap(), NavigationOutcome::Playing { index: 0 });
}

#[tokio::test(start_paused = true)]
async fn next_skips_invalid_track() {
    let h = Harness::new(vec![good("a"), placeholder("b"), good("c")]);
    h.service.set_current_index(Some(0)).unwrap();

    let outcome = h.service.next().await.unwrap();

    assert_eq!(outcome, NavigationOutcome::Playing { index: 2 });
    assert_eq!(h.service.current_index(), Some(2));
    assert!(h.service.is_playing());
    assert_eq!(h.service.status().current_track_id, Some(TrackId::new("c")));
    assert_eq!(h.playing_bytes(), b"ID3\x04c");
    // The placeholder never reached the engine.
    assert_eq!(h.backend.loaded_sources().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn next_skips_tracks_the_platform_cannot_decode() {
    let h = Harness::new(vec![
        good("a"),
        Track::new("b", "B", "Artist").with_audio(encode(b"fLaC\x00\x00")),
        good("c"),
    ]);
    h.backend.reject_format(tempo_playback::AudioFormat::Flac);
    h.service.set_current_index(Some(0)).unwrap();

    assert_eq!(h.service.next().await.unwrap(), NavigationOutcome::Playing { index: 2 });
    assert_eq!(h.backend.live_object_urls(), 1);
}

#[tokio::test(start_paused = true)]
async fn next_gives_up_after_one_pass() {
    let h = Harness::new(vec![placeholder("a"), placeholder("b"), Track::new("c", "C", "Artist")]);
    h.service.set_current_index(Some(0)).unwrap();

    let outcome = h.service.next().await.unwrap();

    assert!(matches!(outcome, NavigationOutcome::Exhausted { attempts: 3, .. }));
    assert!(!h.service.is_playing());
    assert!(!h.service.engine().has_source());
}

#[tokio::test(start_paused = true)]
async fn exhaustion_by_play_failures_unloads_engine() {
    let h = Harness::new(vec![good("a"), good("b")]);
    h.backend.set_play_failure(Some("MEDIA_ERR_DECODE".to_string()));

    let outcome = h.service.next().await.unwrap();

    assert!(matches!(outcome, NavigationOutcome::Exhausted { attempts: 2, .. }));
    // Both loaded fine; only play() refused them.
    assert_eq!(h.backend.loaded_sources().len(), 2);
    assert!(!h.service.engine().has_source());
    assert!(h.backend.current_source().is_none());
    assert_eq!(h.backend.live_object_urls(), 0);
    assert!(!h.service.is_playing());
}

#[tokio::test(start_paused = true)]
async fn blocked_autoplay_stops_navigation_without_skipping() {
    let h = Harness::new(vec![good("a"), good("b"), good("c")]);
    h.backend.set_autoplay_allowed(false);
    h.service.set_current_index(Some(0)).unwrap();

    assert_eq!(
        h.service.next().await.unwrap(),
        NavigationOutcome::AwaitingGesture { index: 1 }
    );
    assert_eq!(h.backend.loaded_sources().len(), 1);
    assert!(!h.service.is_playing());
    assert_eq!(h.service.state(), PlaybackState::Paused);
}

#[tokio::test(start_paused = true)]
async fn shuffle_never_repeats_previous_index() {
    let tracks: Vec<Track> = (0..6).map(|i| good(&i.to_string())).collect();
    let h = Harness::new(tracks);
    assert_eq!(h.service.toggle_shuffle(), ShuffleMode::On);
    h.service.set_current_index(Some(0)).unwrap();

    let mut previous = 0;
    for _ in 0..40 {
        match h.service.next().await.unwrap() {
            NavigationOutcome::Playing { index } => {
                assert_ne!(index, previous);
                previous = index;
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn shuffle_single_track_replays_it() {
    let h = Harness::new(vec![good("only")]);
    h.service.toggle_shuffle();
    h.service.set_current_index(Some(0)).unwrap();
    assert_eq!(h.service.next().await.unwrap(), NavigationOutcome::Playing { index: 0 });
}

// ============================================================================
// previous()
// ============================================================================

#[tokio::test(start_paused = true)]
async fn previous_steps_back_without_retry() {
    let h = Harness::new(vec![good("a"), placeholder("b"), good("c")]);
    h.service.set_current_index(Some(2)).unwrap();

    let outcome = h.service.previous().await.unwrap();

    assert!(matches!(outcome, NavigationOutcome::Exhausted { attempts: 1, .. }));
    assert_eq!(h.service.current_index(), Some(1));
    assert!(!h.service.is_playing());
}

#[tokio::test(start_paused = true)]
async fn shuffled_previous_retries_once() {
    let h = Harness::new(vec![good("a"), placeholder("b"), placeholder("c"), good("d")]);
    h.service.toggle_shuffle();
    h.service.set_current_index(Some(0)).unwrap();

    let outcome = h.service.previous().await.unwrap();
    match outcome {
        NavigationOutcome::Playing { index } => assert_eq!(index, 3),
        NavigationOutcome::Exhausted { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn shuffled_previous_gives_up_after_alternate() {
    let h = Harness::new(vec![good("a"), placeholder("b"), placeholder("c")]);
    h.service.toggle_shuffle();
    h.service.set_current_index(Some(0)).unwrap();

    assert!(matches!(
        h.service.previous().await.unwrap(),
        NavigationOutcome::Exhausted { attempts: 2, .. }
    ));
}

// ============================================================================
// ended
// ============================================================================

#[tokio::test(start_paused = true)]
async fn ended_on_single_track_stops() {
    let h = Harness::new(vec![good("a")]);
    assert_eq!(h.service.next().await.unwrap(), NavigationOutcome::Playing { index: 0 });
    tokio::time::advance(Duration::from_secs(1)).await;

    h.backend.finish();
    assert_eq!(h.service.pump_events().await, 1);

    assert!(!h.service.is_playing());
    assert_eq!(h.service.current_index(), Some(0));
    assert_eq!(h.backend.loaded_sources().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn backend_ended_signal_advances_playlist() {
    let h = Harness::new(vec![good("a"), good("b")]);
    h.service.next().await.unwrap();

    let runner = h.service.run_events();
    tokio::pin!(runner);
    h.backend.finish();
    tokio::select! {
        _ = &mut runner => panic!("event loop stopped while the engine is alive"),
        () = tokio::time::sleep(Duration::from_millis(10)) => {}
    }

    assert_eq!(h.service.current_index(), Some(1));
    assert!(h.service.is_playing());
    assert_eq!(h.playing_bytes(), b"ID3\x04b");
}

#[tokio::test(start_paused = true)]
async fn ended_at_last_with_repeat_off_reports_stopped() {
    let h = Harness::new(vec![good("a"), good("b")]);
    h.service.set_current_index(Some(0)).unwrap();
    h.service.next().await.unwrap();

    assert_eq!(h.service.handle_ended().await.unwrap(), NavigationOutcome::Stopped);
}

#[tokio::test(start_paused = true)]
async fn ended_mid_playlist_advances() {
    let h = Harness::new(vec![good("a"), good("b")]);
    h.service.next().await.unwrap();
    assert_eq!(
        h.service.handle_ended().await.unwrap(),
        NavigationOutcome::Playing { index: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn ended_with_repeat_all_wraps() {
    let h = Harness::new(vec![good("a"), good("b")]);
    assert_eq!(h.service.toggle_repeat(), RepeatMode::All);
    h.service.set_current_index(Some(0)).unwrap();
    h.service.next().await.unwrap();

    assert_eq!(
        h.service.handle_ended().await.unwrap(),
        NavigationOutcome::Playing { index: 0 }
    );
}

#[tokio::test(start_paused = true)]
async fn ended_with_repeat_one_replays_current() {
    let h = Harness::with_config(
        vec![good("a"), good("b")],
        PlaybackConfig {
            repeat: RepeatMode::One,
            ..PlaybackConfig::default()
        },
    );
    h.service.next().await.unwrap();
    h.service.seek(90.0).unwrap();

    assert_eq!(
        h.service.handle_ended().await.unwrap(),
        NavigationOutcome::Playing { index: 0 }
    );
    assert_eq!(h.service.status().current_time, 0.0);
    assert_eq!(h.backend.loaded_sources().len(), 1);
}

// ============================================================================
// Status & events
// ============================================================================

#[tokio::test(start_paused = true)]
async fn engine_events_update_status() {
    let h = Harness::new(vec![good("a")]);
    h.service.next().await.unwrap();

    let engine = h.service.engine();
    engine.handle_platform_event(PlatformEvent::DurationChange(201.5)).await;
    engine.handle_platform_event(PlatformEvent::TimeUpdate(12.25)).await;
    engine.handle_platform_event(PlatformEvent::CanPlay).await;
    assert_eq!(h.service.pump_events().await, 3);

    let status = h.service.status();
    assert_eq!(status.duration, 201.5);
    assert_eq!(status.current_time, 12.25);
}

#[tokio::test(start_paused = true)]
async fn volume_is_clamped() {
    let h = Harness::new(vec![good("a")]);
    assert_eq!(h.service.set_volume(-0.5).unwrap(), 0.0);
    assert_eq!(h.service.status().volume, 0.0);
    assert_eq!(h.service.set_volume(1.5).unwrap(), 1.0);
    assert_eq!(h.service.status().volume, 1.0);
}

#[tokio::test(start_paused = true)]
async fn repeat_cycles_back_after_three_toggles() {
    let h = Harness::new(vec![]);
    assert_eq!(h.service.toggle_repeat(), RepeatMode::All);
    assert_eq!(h.service.toggle_repeat(), RepeatMode::One);
    assert_eq!(h.service.toggle_repeat(), RepeatMode::Off);
}

#[tokio::test(start_paused = true)]
async fn set_playlist_keeps_fitting_index() {
    let h = Harness::new(vec![good("a"), good("b"), good("c")]);
    h.service.set_current_index(Some(1)).unwrap();

    h.service.set_playlist(vec![TrackId::new("x"), TrackId::new("y")]);
    assert_eq!(h.service.current_index(), Some(1));

    h.service.set_playlist(vec![]);
    assert_eq!(h.service.current_index(), None);
}

#[tokio::test(start_paused = true)]
async fn newer_selection_supersedes_older() {
    let h = Harness::new(vec![good("a"), good("b")]);
    h.backend.set_load_latency(Duration::from_millis(40));

    let a = TrackId::new("a");
    let b = TrackId::new("b");

    let (first, second) = tokio::join!(h.service.select_track(&a), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.service.select_track(&b).await
    });

    assert!(matches!(first, Err(PlaybackError::Superseded)));
    second.unwrap();
    assert_eq!(h.service.status().current_track_id, Some(TrackId::new("b")));
    assert_eq!(h.playing_bytes(), b"ID3\x04b");
    assert_eq!(h.service.state(), PlaybackState::Paused);
}

// ============================================================================
// Cache-backed resolution
// ============================================================================

#[tokio::test(start_paused = true)]
async fn short_keys_resolve_through_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = MapResolver {
        payloads: HashMap::from([("key-a".to_string(), encode(b"RIFF\x24\x00\x00\x00WAVE"))]),
        calls: Arc::clone(&calls),
    };
    let cache = Arc::new(AudioCacheService::new(Duration::from_secs(86_400)).with_strategy(resolver));

    let backend = HeadlessBackend::new();
    let store = Arc::new(TrackStore::with_tracks(vec![
        Track::new("a", "A", "Artist").with_audio("key-a"),
        Track::new("b", "B", "Artist").with_audio("key-b"),
    ]));
    let service = PlaybackService::with_backend(
        Box::new(backend.clone()),
        store,
        PlaybackConfig::default(),
    )
    .unwrap()
    .with_cache(Arc::clone(&cache));
    service.set_playlist(vec![TrackId::new("a"), TrackId::new("b")]);

    service.select_track(&TrackId::new("a")).await.unwrap();
    service.select_track(&TrackId::new("a")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.current_bytes().unwrap(), b"RIFF\x24\x00\x00\x00WAVE");

    // Unresolvable key falls back to itself and fails validation.
    let err = service.select_track(&TrackId::new("b")).await.unwrap_err();
    assert!(err.is_unplayable());
    assert!(cache.contains("key-b"));
}

// ============================================================================
// Controllers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn play_track_sets_playlist_and_plays() {
    let tracks = vec![good("a"), good("b"), good("c")];
    let playlist = ids(&tracks);
    let h = Harness::new(tracks);
    let controller = TracksController::new(Arc::clone(&h.service));

    let outcome = controller.play_track(&TrackId::new("b"), playlist.clone()).await.unwrap();

    assert_eq!(outcome, PlayTrackOutcome::Playing);
    assert_eq!(h.service.current_index(), Some(1));
    assert!(h.service.is_playing());

    let again = controller.play_track(&TrackId::new("b"), playlist).await.unwrap();
    assert_eq!(again, PlayTrackOutcome::AlreadyPlaying);
    assert_eq!(h.backend.loaded_sources().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn play_track_without_audio_moves_on() {
    let tracks = vec![Track::new("a", "A", "Artist"), good("b")];
    let playlist = ids(&tracks);
    let h = Harness::new(tracks);
    let controller = TracksController::new(Arc::clone(&h.service));

    let outcome = controller.play_track(&TrackId::new("a"), playlist.clone()).await.unwrap();
    assert_eq!(
        outcome,
        PlayTrackOutcome::Skipped(NavigationOutcome::Playing { index: 1 })
    );

    let last = controller.play_track(&TrackId::new("zzz"), playlist).await.unwrap();
    assert_eq!(last, PlayTrackOutcome::Unplayable);
}

#[tokio::test(start_paused = true)]
async fn play_track_with_placeholder_moves_on() {
    let tracks = vec![placeholder("a"), good("b")];
    let playlist = ids(&tracks);
    let h = Harness::new(tracks);
    let controller = TracksController::new(Arc::clone(&h.service));

    let outcome = controller.play_track(&TrackId::new("a"), playlist).await.unwrap();
    assert_eq!(
        outcome,
        PlayTrackOutcome::Skipped(NavigationOutcome::Playing { index: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn play_track_load_failure_moves_on() {
    let tracks = vec![
        Track::new("a", "A", "Artist").with_audio(encode(b"fLaC\x00\x00\x00\x22")),
        good("b"),
    ];
    let playlist = ids(&tracks);
    let h = Harness::new(tracks);
    h.backend.reject_format(tempo_playback::AudioFormat::Flac);
    let controller = TracksController::new(Arc::clone(&h.service));

    let outcome = controller.play_track(&TrackId::new("a"), playlist).await.unwrap();

    assert_eq!(
        outcome,
        PlayTrackOutcome::Skipped(NavigationOutcome::Playing { index: 1 })
    );
    assert_eq!(h.playing_bytes(), b"ID3\x04b");
    assert_eq!(h.backend.live_object_urls(), 1);
}

#[tokio::test(start_paused = true)]
async fn play_track_placeholder_at_end_propagates() {
    let tracks = vec![good("a"), placeholder("b")];
    let playlist = ids(&tracks);
    let h = Harness::new(tracks);
    let controller = TracksController::new(Arc::clone(&h.service));

    assert!(matches!(
        controller.play_track(&TrackId::new("b"), playlist).await,
        Err(PlaybackError::InvalidAudioPayload(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn play_track_swallows_autoplay_refusal() {
    let tracks = vec![good("a")];
    let playlist = ids(&tracks);
    let h = Harness::new(tracks);
    h.backend.set_autoplay_allowed(false);
    let controller = TracksController::new(Arc::clone(&h.service));

    assert_eq!(
        controller.play_track(&TrackId::new("a"), playlist).await.unwrap(),
        PlayTrackOutcome::AwaitingGesture
    );

    // The user presses play.
    h.backend.set_autoplay_allowed(true);
    let player = PlayerController::new(Arc::clone(&h.service));
    assert!(player.toggle_play_pause().await.unwrap());
    assert!(h.service.is_playing());
}

#[tokio::test(start_paused = true)]
async fn play_track_pauses_a_different_track_first() {
    let tracks = vec![good("a"), good("b")];
    let playlist = ids(&tracks);
    let h = Harness::new(tracks);
    let controller = TracksController::new(Arc::clone(&h.service));

    controller.play_track(&TrackId::new("a"), playlist.clone()).await.unwrap();
    controller.play_track(&TrackId::new("b"), playlist).await.unwrap();

    assert_eq!(h.service.status().current_track_id, Some(TrackId::new("b")));
    assert_eq!(h.playing_bytes(), b"ID3\x04b");
    assert!(h.service.is_playing());
}

#[tokio::test(start_paused = true)]
async fn player_controller_toggles() {
    let h = Harness::new(vec![good("a")]);
    h.service.next().await.unwrap();
    tokio::time::advance(Duration::from_secs(1)).await;

    let player = PlayerController::new(Arc::clone(&h.service));
    assert!(!player.toggle_play_pause().await.unwrap());
    assert!(h.backend.is_paused());
    assert!(player.toggle_play_pause().await.unwrap());
}
