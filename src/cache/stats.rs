//! Cache Statistics Module
//!
//! Tracks per-tier hits and misses and assembles statistics snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::remote::ConnectionState;

// == Tier Stats ==
/// Hit/miss counters for a single tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    /// Number of reads served by this tier
    pub hits: u64,
    /// Number of reads this tier could not serve
    pub misses: u64,
}

impl TierStats {
    // == Hit Rate ==
    /// Calculates the tier hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }
}

// == Stats Collector ==
/// Process-wide counters shared by every cache operation.
///
/// When disabled, recording calls are no-ops and snapshots report zeros.
#[derive(Debug)]
pub struct StatsCollector {
    enabled: bool,
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    remote_hits: AtomicU64,
    remote_misses: AtomicU64,
}

impl StatsCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            memory_hits: AtomicU64::new(0),
            memory_misses: AtomicU64::new(0),
            remote_hits: AtomicU64::new(0),
            remote_misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_memory_hit(&self) {
        self.bump(&self.memory_hits);
    }

    pub fn record_memory_miss(&self) {
        self.bump(&self.memory_misses);
    }

    pub fn record_remote_hit(&self) {
        self.bump(&self.remote_hits);
    }

    pub fn record_remote_miss(&self) {
        self.bump(&self.remote_misses);
    }

    /// Current memory tier counters.
    pub fn memory(&self) -> TierStats {
        TierStats {
            hits: self.memory_hits.load(Ordering::Relaxed),
            misses: self.memory_misses.load(Ordering::Relaxed),
        }
    }

    /// Current remote tier counters.
    pub fn remote(&self) -> TierStats {
        TierStats {
            hits: self.remote_hits.load(Ordering::Relaxed),
            misses: self.remote_misses.load(Ordering::Relaxed),
        }
    }

    /// Hit rate across both tiers.
    ///
    /// Every overall miss records a memory miss, so memory misses are the
    /// lookup misses and the two tiers' hits are the lookup hits.
    pub fn combined_hit_rate(&self) -> f64 {
        let memory = self.memory();
        let remote = self.remote();
        let hits = memory.hits + remote.hits;
        ratio(hits, hits + memory.misses)
    }

    // == Reset ==
    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.memory_hits,
            &self.memory_misses,
            &self.remote_hits,
            &self.remote_misses,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn bump(&self, counter: &AtomicU64) {
        if self.enabled {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// == Snapshots ==
/// Memory tier section of a [`CacheStats`] snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryTierStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
}

/// Remote tier section of a [`CacheStats`] snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteTierStats {
    pub enabled: bool,
    pub state: ConnectionState,
    /// Keys held under this cache's prefix; None while the tier is unavailable
    pub size: Option<u64>,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Point-in-time view of the whole cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub memory: MemoryTierStats,
    pub remote: RemoteTierStats,
    pub combined_hit_rate: f64,
    /// Approximate bytes held by the memory tier
    pub memory_usage_bytes: usize,
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
