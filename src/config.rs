//! Configuration Module
//!
//! Handles loading, defaulting and validating cache configuration.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Fallback Strategy ==
/// Order in which tiers are consulted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackStrategy {
    /// Memory first, remote on miss (remote hits are promoted)
    #[default]
    MemoryFirst,
    /// Remote first, memory on miss
    RedisFirst,
    /// Remote tier never participates
    MemoryOnly,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStrategy::MemoryFirst => "memory-first",
            FallbackStrategy::RedisFirst => "redis-first",
            FallbackStrategy::MemoryOnly => "memory-only",
        }
    }
}

impl fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FallbackStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory-first" => Ok(FallbackStrategy::MemoryFirst),
            "redis-first" => Ok(FallbackStrategy::RedisFirst),
            "memory-only" => Ok(FallbackStrategy::MemoryOnly),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown fallback strategy '{}'",
                other
            ))),
        }
    }
}

// == Remote Config ==
/// Connection parameters for the Redis tier.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Redis connection URL
    pub url: String,
    /// Optional password, applied on top of the URL
    pub password: Option<String>,
    /// Prefix prepended to every key written remotely
    pub key_prefix: String,
    /// Per-call timeout
    pub command_timeout: Duration,
    /// Consecutive failures tolerated before the tier is disabled
    pub max_reconnect_attempts: u32,
    /// Backoff step between reconnect attempts
    pub reconnect_base_delay: Duration,
    /// Backoff ceiling
    pub reconnect_max_delay: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            password: None,
            key_prefix: "cache:".to_string(),
            command_timeout: Duration::from_millis(2000),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(50),
            reconnect_max_delay: Duration::from_millis(2000),
        }
    }
}

// == Cache Config ==
/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Memory tier capacity enforced by the cleanup sweep
    pub max_memory_entries: usize,
    /// TTL applied when none (or zero) is given
    pub default_ttl: Duration,
    /// Interval between cleanup sweeps
    pub cleanup_interval: Duration,
    /// Whether the remote tier participates at all
    pub remote_enabled: bool,
    /// Whether hit/miss counters are recorded
    pub stats_enabled: bool,
    /// Read order across tiers
    pub fallback_strategy: FallbackStrategy,
    /// Remote tier settings, ignored unless `remote_enabled`
    pub remote: RemoteConfig,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_MEMORY_ENTRIES` - Memory tier capacity (default: 1000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Sweep interval in milliseconds (default: 60000)
    /// - `CACHE_REMOTE_ENABLED` - Enable the Redis tier (default: false)
    /// - `CACHE_STATS_ENABLED` - Record hit/miss counters (default: true)
    /// - `CACHE_FALLBACK_STRATEGY` - memory-first | redis-first | memory-only
    /// - `REDIS_URL`, `REDIS_PASSWORD`, `REDIS_KEY_PREFIX`
    /// - `REDIS_COMMAND_TIMEOUT_MS`, `REDIS_MAX_RECONNECT_ATTEMPTS`
    /// - `REDIS_RECONNECT_BASE_DELAY_MS`, `REDIS_RECONNECT_MAX_DELAY_MS`
    ///
    /// Unparseable values fall back to their defaults; call [`validate`](Self::validate)
    /// (or construct a cache) to reject out-of-range ones.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let remote_defaults = defaults.remote.clone();

        Self {
            max_memory_entries: env_parse("CACHE_MAX_MEMORY_ENTRIES")
                .unwrap_or(defaults.max_memory_entries),
            default_ttl: env_parse("CACHE_DEFAULT_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_ttl),
            cleanup_interval: env_parse("CACHE_CLEANUP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleanup_interval),
            remote_enabled: env_parse("CACHE_REMOTE_ENABLED").unwrap_or(defaults.remote_enabled),
            stats_enabled: env_parse("CACHE_STATS_ENABLED").unwrap_or(defaults.stats_enabled),
            fallback_strategy: env_parse("CACHE_FALLBACK_STRATEGY")
                .unwrap_or(defaults.fallback_strategy),
            remote: RemoteConfig {
                url: env::var("REDIS_URL").unwrap_or(remote_defaults.url),
                password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
                key_prefix: env::var("REDIS_KEY_PREFIX").unwrap_or(remote_defaults.key_prefix),
                command_timeout: env_parse("REDIS_COMMAND_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(remote_defaults.command_timeout),
                max_reconnect_attempts: env_parse("REDIS_MAX_RECONNECT_ATTEMPTS")
                    .unwrap_or(remote_defaults.max_reconnect_attempts),
                reconnect_base_delay: env_parse("REDIS_RECONNECT_BASE_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(remote_defaults.reconnect_base_delay),
                reconnect_max_delay: env_parse("REDIS_RECONNECT_MAX_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(remote_defaults.reconnect_max_delay),
            },
        }
    }

    // == Validate ==
    /// Rejects configurations the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_memory_entries == 0 {
            return Err(invalid("max_memory_entries must be greater than 0"));
        }
        if self.default_ttl.is_zero() {
            return Err(invalid("default_ttl must be greater than 0"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(invalid("cleanup_interval must be greater than 0"));
        }

        if self.remote_enabled {
            if self.remote.url.trim().is_empty() {
                return Err(invalid("remote url must not be empty when remote is enabled"));
            }
            if self.remote.command_timeout.is_zero() {
                return Err(invalid("remote command_timeout must be greater than 0"));
            }
            if self.remote.max_reconnect_attempts == 0 {
                return Err(invalid("remote max_reconnect_attempts must be greater than 0"));
            }
            if self.remote.reconnect_max_delay < self.remote.reconnect_base_delay {
                return Err(invalid(
                    "remote reconnect_max_delay must not be below reconnect_base_delay",
                ));
            }
        }

        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_entries: 1000,
            default_ttl: Duration::from_millis(300_000),
            cleanup_interval: Duration::from_millis(60_000),
            remote_enabled: false,
            stats_enabled: true,
            fallback_strategy: FallbackStrategy::MemoryFirst,
            remote: RemoteConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn invalid(msg: &str) -> CacheError {
    CacheError::InvalidConfig(msg.to_string())
}
