//! Tiered Cache - an in-process memory cache backed by an optional Redis tier
//!
//! Provides TTL expiration, LRU eviction under memory pressure, a configurable
//! fallback strategy between tiers, and per-tier hit/miss statistics. Remote
//! outages degrade the cache to memory-only instead of failing calls.
//!
//! ```ignore
//! let cache = Arc::new(TieredCache::new(CacheConfig::from_env())?);
//! cache.init().await;
//!
//! let price: f64 = cache
//!     .get_or_set(&keys::price("btcusdt"), || fetch_price("BTCUSDT"), None)
//!     .await?;
//!
//! cache.dispose().await;
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod keys;
pub mod remote;
pub mod tasks;

pub use cache::{CacheStats, SweepReport, TierStats};
pub use codec::{Codec, JsonCodec};
pub use config::{CacheConfig, FallbackStrategy, RemoteConfig};
pub use coordinator::{HealthReport, TieredCache};
pub use error::{CacheError, RemoteError, Result};
pub use remote::{ConnectionState, ConnectionStatus, RedisStore, RemoteStore};
pub use tasks::CleanupScheduler;
