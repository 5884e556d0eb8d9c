/// Tempo - command-line client for the Tempo music API
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use settings::CliConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{TrackId, TrackStore};
use tempo_playback::{
    classify, decode_base64, AudioCacheService, HeadlessBackend, NavigationOutcome, PayloadKind,
    PlaybackService, ShuffleMode,
};
use tempo_server_client::{PrimaryAudioResolver, SecondaryAudioResolver, TempoServerClient};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Browse and check a Tempo music library", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TEMPO_CONFIG")]
    config: Option<PathBuf>,

    /// Server API base URL
    #[arg(long, env = "TEMPO_SERVER_URL")]
    server: Option<String>,

    /// Bearer token
    #[arg(long, env = "TEMPO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the catalogue
    Tracks {
        /// Only list favorites
        #[arg(short, long)]
        favorites: bool,
    },
    /// Resolve and validate a track's audio without playing it aloud
    Check {
        /// Track id
        id: String,
    },
    /// Walk a playlist on a silent player, skipping unplayable tracks
    Play {
        /// Track ids in play order (default: the whole catalogue)
        ids: Vec<String>,

        /// Pick tracks at random
        #[arg(short, long)]
        shuffle: bool,

        /// Stop after this many tracks
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Add a track to favorites, or remove it
    Favorite {
        /// Track id
        id: String,

        /// Remove instead of add
        #[arg(short, long)]
        remove: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Tracks { .. } => "tracks",
            Self::Check { .. } => "check",
            Self::Play { .. } => "play",
            Self::Favorite { .. } => "favorite",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempo=info,tempo_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.server {
        config.server.url = url;
    }
    if let Some(token) = cli.token {
        config.server.access_token = Some(token);
    }
    config.validate()?;

    info!("Starting Tempo CLI");
    info!(server = %config.server.url, "Server configuration");
    debug!(
        authenticated = config.server.access_token.is_some(),
        cache_ttl_secs = config.playback.cache_ttl_secs,
        "Resolved configuration"
    );

    let client = TempoServerClient::new(config.server.clone())
        .context("Failed to create server client")?;

    info!(command = cli.command.name(), "Running command");
    match cli.command {
        Commands::Tracks { favorites } => list_tracks(&client, favorites).await?,
        Commands::Check { id } => check_track(&client, &config, &id).await?,
        Commands::Play { ids, shuffle, limit } => {
            play(&client, &config, ids, shuffle, limit).await?;
        }
        Commands::Favorite { id, remove } => {
            let reply = client
                .toggle_favorite(&TrackId::new(id), remove)
                .await?;
            if !reply.message.is_empty() {
                println!("{}", reply.message);
            }
        }
    }

    Ok(())
}

async fn list_tracks(client: &TempoServerClient, favorites: bool) -> Result<()> {
    let tracks = if favorites {
        client.get_favorites().await?
    } else {
        client.get_tracks().await?
    };

    println!("Tracks ({}):", tracks.len());
    for track in tracks {
        println!(
            "  {} - {} - {}  [{}]",
            track.id,
            track.artist,
            track.title,
            payload_label(track.encoded_audio.as_deref())
        );
    }

    Ok(())
}

/// Short description of an inline payload reference
fn payload_label(encoded: Option<&str>) -> String {
    let Some(encoded) = encoded.filter(|s| !s.is_empty()) else {
        return "no audio".to_string();
    };
    match decode_base64(encoded).map(|bytes| classify(&bytes)) {
        Ok(PayloadKind::Audio(format)) => format.mime_type().to_string(),
        Ok(PayloadKind::Placeholder) => "placeholder".to_string(),
        // Short keys resolved through the audio cache land here too
        Ok(PayloadKind::Unrecognized) | Err(_) => "key".to_string(),
    }
}

/// Service over a silent backend, with the server's audio resolvers
///
/// The backend handle is returned so the caller can drive it.
async fn build_service(
    client: &TempoServerClient,
    config: &CliConfig,
) -> Result<(Arc<PlaybackService>, Arc<TrackStore>, HeadlessBackend)> {
    let store = Arc::new(TrackStore::new());
    store
        .refresh(client)
        .await
        .context("Failed to load the catalogue")?;
    info!(tracks = store.tracks().len(), "Catalogue loaded");

    let cache = AudioCacheService::new(Duration::from_secs(config.playback.cache_ttl_secs))
        .with_strategy(PrimaryAudioResolver::new(client.clone()))
        .with_strategy(SecondaryAudioResolver::new(client.clone()));

    let backend = HeadlessBackend::new();
    let service = PlaybackService::with_backend(
        Box::new(backend.clone()),
        Arc::clone(&store),
        config.playback.clone(),
    )?
    .with_cache(Arc::new(cache));

    Ok((Arc::new(service), store, backend))
}

async fn check_track(client: &TempoServerClient, config: &CliConfig, id: &str) -> Result<()> {
    let (service, _, _) = build_service(client, config).await?;
    let id = TrackId::new(id);

    match service.select_track(&id).await {
        Ok(()) => println!("{id}: playable ({:.1}s)", service.status().duration),
        Err(e) => {
            warn!(track_id = %id, error = %e, "Track failed validation");
            println!("{id}: unplayable: {e}");
        }
    }

    service.shutdown();
    Ok(())
}

async fn play(
    client: &TempoServerClient,
    config: &CliConfig,
    ids: Vec<String>,
    shuffle: bool,
    limit: usize,
) -> Result<()> {
    let (service, store, backend) = build_service(client, config).await?;

    let playlist: Vec<TrackId> = if ids.is_empty() {
        store.tracks().into_iter().map(|track| track.id).collect()
    } else {
        ids.into_iter().map(TrackId::new).collect()
    };
    service.set_playlist(playlist);
    if shuffle && service.status().shuffle == ShuffleMode::Off {
        service.toggle_shuffle();
    }

    let print_current = || {
        let title = service
            .status()
            .current_track_id
            .and_then(|id| store.get(&id))
            .map_or_else(|| "?".to_string(), |track| track.title);
        let position = service.current_index().map_or(0, |index| index + 1);
        println!("{position:>3}. {title}");
    };

    match service.next().await? {
        NavigationOutcome::Playing { .. } | NavigationOutcome::AwaitingGesture { .. } => {
            print_current();
        }
        NavigationOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            println!(
                "No playable track after {attempts} attempts: {}",
                last_error.as_deref().unwrap_or("unknown error")
            );
            service.shutdown();
            return Ok(());
        }
        NavigationOutcome::Idle | NavigationOutcome::Stopped | NavigationOutcome::Superseded => {
            service.shutdown();
            return Ok(());
        }
    }

    // Each track "ends" at once; the service reacts to the signal itself.
    for _ in 1..limit {
        backend.finish();
        service.pump_events().await;
        if !service.is_playing() {
            println!("Stopped");
            break;
        }
        print_current();
    }

    service.shutdown();
    Ok(())
}
