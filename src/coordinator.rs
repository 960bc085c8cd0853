//! Unified Cache Coordinator
//!
//! Orchestrates reads and writes across the memory and remote tiers
//! according to the configured fallback strategy.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{
    validate_key, CacheStats, MemoryStore, MemoryTierStats, RemoteTierStats, StatsCollector,
    SweepReport, MAX_TTL, MAX_VALUE_SIZE,
};
use crate::codec::{Codec, JsonCodec};
use crate::config::{CacheConfig, FallbackStrategy};
use crate::error::{CacheError, Result};
use crate::remote::{
    ConnectionState, ConnectionStatus, RedisStore, RemoteOutcome, RemoteStore, RemoteTier,
};
use crate::tasks::CleanupScheduler;

// == Health Report ==
/// Liveness view for an external health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub memory_entries: usize,
    pub strategy: FallbackStrategy,
    /// None when no remote tier is configured
    pub remote: Option<ConnectionStatus>,
    pub cleanup_running: bool,
    pub checked_at: DateTime<Utc>,
}

// == Tiered Cache ==
/// Memory tier backed by an optional remote tier.
///
/// Construct once, share through `Arc`, call [`init`](Self::init) to start
/// background work and [`dispose`](Self::dispose) on shutdown. Tier failures
/// never surface as errors: the only error a read or write returns is
/// [`CacheError::InvalidKey`].
pub struct TieredCache {
    config: CacheConfig,
    memory: Arc<RwLock<MemoryStore>>,
    remote: Option<RemoteTier>,
    codec: Arc<dyn Codec>,
    stats: StatsCollector,
    scheduler: Mutex<Option<CleanupScheduler>>,
}

impl TieredCache {
    // == Constructors ==
    /// Builds a cache from configuration.
    ///
    /// When `remote_enabled` is set, a Redis client is created for the
    /// configured endpoint; no connection is made until [`init`](Self::init)
    /// or the first remote call.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let remote = if config.remote_enabled {
            let store = RedisStore::new(&config.remote)
                .map_err(|e| CacheError::InvalidConfig(format!("redis endpoint: {}", e)))?;
            Some(Arc::new(store) as Arc<dyn RemoteStore>)
        } else {
            None
        };

        Ok(Self::assemble(config, remote))
    }

    /// Builds a cache around a caller-supplied remote store.
    ///
    /// The remote tier is enabled regardless of `config.remote_enabled`.
    pub fn with_remote_store(mut config: CacheConfig, store: Arc<dyn RemoteStore>) -> Result<Self> {
        config.remote_enabled = true;
        config.validate()?;
        Ok(Self::assemble(config, Some(store)))
    }

    /// Replaces the codec used for the remote wire form.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    fn assemble(config: CacheConfig, store: Option<Arc<dyn RemoteStore>>) -> Self {
        let remote = store.map(|s| RemoteTier::new(s, &config.remote));

        Self {
            memory: Arc::new(RwLock::new(MemoryStore::new(config.max_memory_entries))),
            stats: StatsCollector::new(config.stats_enabled),
            codec: Arc::new(JsonCodec),
            scheduler: Mutex::new(None),
            remote,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Lifecycle ==
    /// Connects the remote tier (best effort) and starts the cleanup scheduler.
    ///
    /// Must be called from within a tokio runtime. Calling it twice is harmless.
    pub async fn init(&self) {
        if let Some(remote) = self.active_remote() {
            if !remote.connect().await {
                warn!(
                    store = remote.store_name(),
                    "Remote tier unavailable at startup, serving from memory"
                );
            }
        }

        let mut slot = self.scheduler_slot();
        if slot.is_none() {
            *slot = Some(CleanupScheduler::spawn(
                Arc::clone(&self.memory),
                self.config.cleanup_interval,
            ));
        }

        info!(
            strategy = %self.config.fallback_strategy,
            max_memory_entries = self.config.max_memory_entries,
            default_ttl_ms = u64::try_from(self.config.default_ttl.as_millis()).unwrap_or(u64::MAX),
            remote = self.remote.is_some(),
            "Tiered cache initialized"
        );
    }

    /// Stops the cleanup scheduler and releases the remote connection.
    pub async fn dispose(&self) {
        let scheduler = self.scheduler_slot().take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop();
        }

        if let Some(remote) = &self.remote {
            remote.shutdown().await;
        }

        info!("Tiered cache disposed");
    }

    // == Get ==
    /// Looks a key up according to the fallback strategy.
    ///
    /// A stored value that cannot be read back as `T` is treated as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;

        let found = match self.config.fallback_strategy {
            FallbackStrategy::RedisFirst => self.get_remote_first(key).await,
            FallbackStrategy::MemoryFirst | FallbackStrategy::MemoryOnly => {
                self.get_memory_first(key).await
            }
        };

        if found.is_none() {
            self.record_miss();
        }
        Ok(found)
    }

    async fn get_memory_first<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(value) = self.memory_lookup(key).await {
            self.stats.record_memory_hit();
            return Some(value);
        }

        let remote = self.active_remote()?;
        let value = self.remote_lookup(remote, key).await?;
        self.stats.record_remote_hit();
        Some(value)
    }

    async fn get_remote_first<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(remote) = self.active_remote() {
            if let Some(value) = self.remote_lookup(remote, key).await {
                self.stats.record_remote_hit();
                return Some(value);
            }
        }

        let value = self.memory_lookup(key).await?;
        self.stats.record_memory_hit();
        Some(value)
    }

    async fn memory_lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.memory.write().await.get(key)?;
        decode_typed(key, &value)
    }

    /// Reads from the remote tier and promotes a hit into memory.
    async fn remote_lookup<T: DeserializeOwned>(&self, remote: &RemoteTier, key: &str) -> Option<T> {
        let bytes = remote.get(key).await.ok()??;

        let value = match self.codec.decode(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, codec = self.codec.name(), error = %err, "Corrupted remote payload, treating as miss");
                return None;
            }
        };

        let typed = decode_typed(key, &value)?;

        // Remaining remote TTL is not exposed, so promotion uses the default
        self.memory
            .write()
            .await
            .set(key.to_string(), value, self.config.default_ttl, bytes.len());
        debug!(key, "Promoted remote hit into memory");

        Some(typed)
    }

    fn record_miss(&self) {
        self.stats.record_memory_miss();
        if self.active_remote().is_some() {
            self.stats.record_remote_miss();
        }
    }

    // == Set ==
    /// Stores a value in memory and, best effort, in the remote tier when
    /// it is connected.
    ///
    /// A `ttl` of `None` or zero uses the configured default; longer than
    /// [`MAX_TTL`] is clamped. Values that fail to serialize or exceed
    /// [`MAX_VALUE_SIZE`] are logged and skipped.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        validate_key(key)?;

        let Some((value, bytes)) = self.encode(key, value) else {
            return Ok(());
        };

        let ttl = self.resolve_ttl(ttl);
        self.memory
            .write()
            .await
            .set(key.to_string(), value, ttl, bytes.len());

        // Writes never wait on a reconnect; reads, init and reconnect() drive it
        match self.active_remote() {
            Some(remote) if remote.is_connected() => {
                if let RemoteOutcome::Unavailable = remote.set(key, bytes, ttl_secs(ttl)).await {
                    debug!(key, "Remote write failed, value held in memory only");
                }
            }
            Some(remote) => {
                debug!(key, state = %remote.state(), "Remote tier not connected, value held in memory only");
            }
            None => {}
        }

        Ok(())
    }

    fn encode<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Option<(Value, Vec<u8>)> {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "Value is not serializable, not cached");
                return None;
            }
        };

        let bytes = match self.codec.encode(&value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, codec = self.codec.name(), error = %err, "Encoding failed, not cached");
                return None;
            }
        };

        if bytes.len() > MAX_VALUE_SIZE {
            warn!(
                key,
                size = bytes.len(),
                "Value exceeds maximum size of {} bytes, not cached",
                MAX_VALUE_SIZE
            );
            return None;
        }

        Some((value, bytes))
    }

    // == Has ==
    /// True if the key is live in memory or, when enabled, in the remote tier.
    pub async fn has(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        if self.memory.write().await.has(key) {
            return Ok(true);
        }

        Ok(match self.active_remote() {
            Some(remote) => remote.exists(key).await.ok().unwrap_or(false),
            None => false,
        })
    }

    // == Delete ==
    /// Removes the key from both tiers; true if either held it.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let in_memory = self.memory.write().await.delete(key);
        let in_remote = match self.active_remote() {
            Some(remote) => remote.delete(key).await.ok().unwrap_or(false),
            None => false,
        };

        Ok(in_memory || in_remote)
    }

    // == Clear ==
    /// Empties memory, resets statistics and clears this cache's remote keys.
    pub async fn clear(&self) {
        let dropped = {
            let mut store = self.memory.write().await;
            let len = store.len();
            store.clear();
            len
        };
        self.stats.reset();

        let remote_dropped = match self.active_remote() {
            Some(remote) => remote.clear_prefix().await.ok(),
            None => None,
        };

        info!(memory = dropped, remote = ?remote_dropped, "Cache cleared");
    }

    // == Get Or Set ==
    /// Returns the cached value, or runs `fetcher` and caches its result.
    ///
    /// Concurrent misses on the same key may each run `fetcher`; cached
    /// values are expected to be safely recomputable. Fetcher errors are
    /// returned unchanged and nothing is cached.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Option<Duration>,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(value) = self.get::<T>(key).await? {
            return Ok(value);
        }

        let value = fetcher().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    // == Batch Get ==
    /// Resolves many keys, fetching the missing ones in a single call.
    ///
    /// `fetcher` runs at most once, with exactly the keys still missing.
    /// Keys it leaves out are absent from the result; keys it returns that
    /// were not asked for are ignored.
    pub async fn batch_get<T, K, F, Fut>(
        &self,
        keys: &[K],
        fetcher: F,
        ttl: Option<Duration>,
    ) -> anyhow::Result<HashMap<String, T>>
    where
        T: Serialize + DeserializeOwned,
        K: AsRef<str>,
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = anyhow::Result<HashMap<String, T>>>,
    {
        for key in keys {
            validate_key(key.as_ref())?;
        }

        let mut results = HashMap::new();
        let mut missing = Vec::new();
        let mut seen = HashSet::new();

        for key in keys.iter().map(AsRef::as_ref) {
            if !seen.insert(key) {
                continue;
            }
            match self.get::<T>(key).await? {
                Some(value) => {
                    results.insert(key.to_string(), value);
                }
                None => missing.push(key.to_string()),
            }
        }

        if missing.is_empty() {
            return Ok(results);
        }

        let requested: HashSet<String> = missing.iter().cloned().collect();
        debug!(missing = missing.len(), "Batch fetching missing keys");
        let fetched = fetcher(missing).await?;

        for (key, value) in fetched {
            if !requested.contains(&key) {
                debug!(key = %key, "Ignoring unrequested key from batch fetcher");
                continue;
            }
            self.set(&key, &value, ttl).await?;
            results.insert(key, value);
        }

        Ok(results)
    }

    // == Remote Counters ==
    /// Adds `delta` to a remote integer counter.
    ///
    /// Returns None when the remote tier is absent or unavailable.
    pub async fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>> {
        validate_key(key)?;

        Ok(match self.active_remote() {
            Some(remote) => remote.increment_by(key, delta).await.ok(),
            None => None,
        })
    }

    /// Sets a remote key's TTL; false when the key is missing or the tier is down.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        validate_key(key)?;

        Ok(match self.active_remote() {
            Some(remote) => remote
                .expire(key, ttl_secs(self.resolve_ttl(Some(ttl))))
                .await
                .ok()
                .unwrap_or(false),
            None => false,
        })
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let (size, usage, evictions, expirations) = {
            let store = self.memory.read().await;
            (
                store.len(),
                store.memory_usage_bytes(),
                store.evictions(),
                store.expirations(),
            )
        };

        // Only a live connection is asked, so stats never trigger a reconnect
        let remote_size = match self.active_remote() {
            Some(remote) if remote.is_connected() => remote.size().await.ok(),
            _ => None,
        };

        let memory = self.stats.memory();
        let remote = self.stats.remote();

        CacheStats {
            memory: MemoryTierStats {
                size,
                hits: memory.hits,
                misses: memory.misses,
                hit_rate: memory.hit_rate(),
                evictions,
                expirations,
            },
            remote: RemoteTierStats {
                enabled: self.active_remote().is_some(),
                state: self
                    .remote
                    .as_ref()
                    .map(RemoteTier::state)
                    .unwrap_or(ConnectionState::Disabled),
                size: remote_size,
                hits: remote.hits,
                misses: remote.misses,
                hit_rate: remote.hit_rate(),
            },
            combined_hit_rate: self.stats.combined_hit_rate(),
            memory_usage_bytes: usage,
        }
    }

    // == Health ==
    pub async fn health(&self) -> HealthReport {
        let memory_entries = self.memory.read().await.len();
        let cleanup_running = self
            .scheduler_slot()
            .as_ref()
            .is_some_and(CleanupScheduler::is_running);

        HealthReport {
            memory_entries,
            strategy: self.config.fallback_strategy,
            remote: self.remote.as_ref().map(RemoteTier::status),
            cleanup_running,
            checked_at: Utc::now(),
        }
    }

    /// Explicit reconnect request, the only way out of `Disabled`.
    pub async fn reconnect(&self) -> bool {
        match &self.remote {
            Some(remote) => remote.reconnect().await,
            None => false,
        }
    }

    /// Runs one cleanup pass immediately.
    pub async fn run_cleanup(&self) -> SweepReport {
        let report = self.memory.write().await.sweep();
        debug!(
            expired = report.expired,
            evicted = report.evicted,
            remaining = report.remaining,
            "Manual cache cleanup"
        );
        report
    }

    /// Remote tier, unless absent or excluded by the strategy.
    fn active_remote(&self) -> Option<&RemoteTier> {
        match self.config.fallback_strategy {
            FallbackStrategy::MemoryOnly => None,
            FallbackStrategy::MemoryFirst | FallbackStrategy::RedisFirst => self.remote.as_ref(),
        }
    }

    fn resolve_ttl(&self, ttl: Option<Duration>) -> Duration {
        match ttl {
            Some(ttl) if !ttl.is_zero() => ttl.min(MAX_TTL),
            _ => self.config.default_ttl.min(MAX_TTL),
        }
    }

    fn scheduler_slot(&self) -> MutexGuard<'_, Option<CleanupScheduler>> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode_typed<T: DeserializeOwned>(key: &str, value: &Value) -> Option<T> {
    match T::deserialize(value) {
        Ok(typed) => Some(typed),
        Err(err) => {
            warn!(key, error = %err, "Cached value has unexpected shape, treating as miss");
            None
        }
    }
}

/// Whole seconds for the remote tier, rounded up and at least one.
fn ttl_secs(ttl: Duration) -> u64 {
    let millis = ttl.as_millis();
    let secs = millis.div_ceil(1000).max(1);
    u64::try_from(secs).unwrap_or(u64::MAX)
}
