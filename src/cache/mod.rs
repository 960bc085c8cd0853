//! Cache Module
//!
//! Provides the in-memory tier with TTL expiration and LRU eviction, plus
//! the statistics shared by both tiers.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::{CacheStats, MemoryTierStats, RemoteTierStats, StatsCollector, TierStats};
pub use store::{MemoryStore, SweepReport};

use std::time::Duration;

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed encoded value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Longest TTL honored; larger TTLs are clamped to it
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Fixed bookkeeping cost counted per entry in the footprint estimate
pub const ENTRY_OVERHEAD_BYTES: usize = 64;

// == Key Validation ==
/// Rejects keys that are empty or longer than [`MAX_KEY_LENGTH`].
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must not be empty".to_string()));
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }

    Ok(())
}
