//! Audio cache
//!
//! Track listings carry a short `encoded_audio` string. It is used as a key
//! to resolve the full base64 payload, which is cached for a TTL (24 h by
//! default).
//!
//! Resolution runs a chain of [`AudioResolver`] strategies in order. When
//! every strategy fails, the key itself is returned; downstream validation
//! then decides whether it is playable.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters of a key shown in logs
const KEY_PREVIEW_CHARS: usize = 50;

/// One way of turning a short key into a full base64 payload
#[async_trait]
pub trait AudioResolver: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Resolve `key`; failures should be `PlaybackError::NetworkFetchFailed`
    async fn resolve(&self, key: &str) -> Result<String>;
}

/// Time source for entry ages
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<str>,
    stored_at: DateTime<Utc>,
}

/// Key → full payload cache with a resolution chain
pub struct AudioCacheService {
    entries: Mutex<HashMap<String, CacheEntry>>,
    strategies: Vec<Box<dyn AudioResolver>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AudioCacheService {
    /// Create an empty cache with no strategies
    ///
    /// Without strategies every lookup falls through to the key itself.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            strategies: Vec::new(),
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    /// Append a strategy to the resolution chain
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl AudioResolver + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether an entry stored at `stored_at` has outlived the TTL
    fn is_expired(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A clock that went backwards makes the entry look brand new.
        let age = (now - stored_at).to_std().unwrap_or(Duration::ZERO);
        age >= self.ttl
    }

    /// Full payload for `key`, from cache when fresh
    ///
    /// On a miss the chain runs and its result replaces any previous entry.
    pub async fn get_full_audio(&self, key: &str) -> Arc<str> {
        let preview = preview(key);
        {
            let entries = self.lock();
            if let Some(entry) = entries.get(key) {
                if !self.is_expired(entry.stored_at, self.clock.now()) {
                    debug!(key = %preview, "Audio cache hit");
                    return Arc::clone(&entry.payload);
                }
            }
        }

        debug!(key = %preview, "Audio cache miss, resolving");
        let payload: Arc<str> = self.resolve(key, &preview).await.into();

        self.lock().insert(
            key.to_string(),
            CacheEntry {
                payload: Arc::clone(&payload),
                stored_at: self.clock.now(),
            },
        );
        payload
    }

    async fn resolve(&self, key: &str, preview: &str) -> String {
        for strategy in &self.strategies {
            match strategy.resolve(key).await {
                Ok(payload) => {
                    info!(
                        key = %preview,
                        strategy = strategy.name(),
                        length = payload.len(),
                        "Resolved full audio"
                    );
                    return payload;
                }
                Err(e) => {
                    warn!(key = %preview, strategy = strategy.name(), error = %e, "Audio strategy failed");
                }
            }
        }

        warn!(key = %preview, "All audio strategies failed, using key as payload");
        key.to_string()
    }

    /// Drop entries older than the TTL; returns how many were dropped
    pub fn clean_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry.stored_at, now));
        let removed = before - entries.len();
        if removed > 0 {
            info!(removed, "Expired audio cache entries removed");
        }
        removed
    }

    pub fn clear_cache(&self) {
        self.lock().clear();
        info!("Audio cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `key` has an entry (fresh or not)
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn has_strategies(&self) -> bool {
        !self.strategies.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn preview(key: &str) -> String {
    let mut preview: String = key.chars().take(KEY_PREVIEW_CHARS).collect();
    if key.chars().nth(KEY_PREVIEW_CHARS).is_some() {
        preview.push_str("...");
    }
    preview
}
