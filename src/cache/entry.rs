//! Cache Entry Module
//!
//! Defines the structure for individual memory-tier entries with TTL support.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::cache::MAX_TTL;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// `expires_at` is always `created_at + ttl`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Creation time
    pub created_at: Instant,
    /// Absolute expiration time
    pub expires_at: Instant,
    /// TTL the entry was written with
    pub ttl: Duration,
    /// Number of reads served by this entry
    pub hit_count: u64,
    /// Last read or write
    pub last_accessed_at: Instant,
    /// Encoded payload size, used for the footprint estimate
    pub size_bytes: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` from now.
    ///
    /// # Arguments
    /// * `key` - The key the entry is stored under
    /// * `value` - The value to store
    /// * `ttl` - Time to live, clamped to [`MAX_TTL`]; callers resolve a zero TTL to the default first
    /// * `size_bytes` - Encoded size of `value`
    pub fn new(key: String, value: Value, ttl: Duration, size_bytes: usize) -> Self {
        let now = Instant::now();
        let ttl = ttl.min(MAX_TTL);

        Self {
            key,
            value,
            created_at: now,
            expires_at: now + ttl,
            ttl,
            hit_count: 0,
            last_accessed_at: now,
            size_bytes,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    // == Touch ==
    /// Records a read against the entry.
    pub fn touch(&mut self) {
        self.hit_count += 1;
        self.last_accessed_at = Instant::now();
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
