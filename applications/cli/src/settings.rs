/// CLI configuration
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempo_playback::PlaybackConfig;
use tempo_server_client::ServerConfig;

/// Config file read when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "tempo.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    pub server: ServerConfig,
    pub playback: PlaybackConfig,
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; the default file is optional.
    /// `TEMPO_*` variables override the file, with `__` between section and
    /// key (e.g. `TEMPO_SERVER__URL`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        settings = match path {
            Some(path) => settings.add_source(config::File::from(path.to_path_buf())),
            None => settings.add_source(
                config::File::from(PathBuf::from(DEFAULT_CONFIG_FILE)).required(false),
            ),
        };

        settings = settings.add_source(
            config::Environment::with_prefix("TEMPO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build().context("Failed to read configuration")?;
        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            bail!("Server URL is required (set TEMPO_SERVER__URL or --server)");
        }

        let volume = self.playback.volume;
        if !(0.0..=1.0).contains(&volume) {
            bail!("playback.volume must be between 0 and 1, got {volume}");
        }

        let step = self.playback.skip_step_secs;
        if !step.is_finite() || step <= 0.0 {
            bail!("playback.skip_step_secs must be positive, got {step}");
        }

        if self.playback.cache_ttl_secs == 0 {
            bail!("playback.cache_ttl_secs must be at least 1");
        }

        Ok(())
    }
}
