//! Memory Store Module
//!
//! In-process tier combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::cache::{CacheEntry, LruTracker, ENTRY_OVERHEAD_BYTES};

// == Sweep Report ==
/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries removed because their TTL elapsed
    pub expired: usize,
    /// Entries evicted to get back under capacity
    pub evicted: usize,
    /// Entries remaining after the pass
    pub remaining: usize,
}

// == Memory Store ==
/// Bounded key/value store with per-entry TTL and lazy expiration.
///
/// Capacity is enforced by [`sweep`](Self::sweep), not by `set`, so the
/// store may briefly hold more than `max_entries` between sweeps.
#[derive(Debug)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Maximum number of entries kept after a sweep
    max_entries: usize,
    /// Running footprint estimate
    usage_bytes: usize,
    /// Entries evicted for capacity
    evictions: u64,
    /// Entries removed after expiring
    expirations: u64,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a new MemoryStore with the given capacity.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            max_entries,
            usage_bytes: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    // == Set ==
    /// Stores a value expiring `ttl` from now.
    ///
    /// If the key already exists, the value is overwritten and TTL is reset.
    pub fn set(&mut self, key: String, value: Value, ttl: Duration, size_bytes: usize) {
        let entry = CacheEntry::new(key.clone(), value, ttl, size_bytes);
        self.usage_bytes += footprint(&entry);

        if let Some(old) = self.entries.insert(key.clone(), entry) {
            self.usage_bytes -= footprint(&old);
        }

        self.lru.touch(&key);
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns None if the key is missing or expired; an expired entry is
    /// removed by the access that discovers it.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if self.purge_if_expired(key) {
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.touch();
        let value = entry.value.clone();
        self.lru.touch(key);
        Some(value)
    }

    // == Has ==
    /// Returns true if the key is present and unexpired.
    ///
    /// Does not count as an access for LRU purposes.
    pub fn has(&mut self, key: &str) -> bool {
        !self.purge_if_expired(key) && self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes an entry by key, reporting whether one existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Removes all entries and resets counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.usage_bytes = 0;
        self.evictions = 0;
        self.expirations = 0;
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.remove_entry(&key);
        }

        self.expirations += count as u64;
        count
    }

    // == Evict Overflow ==
    /// Evicts least recently used entries until the store is within capacity.
    ///
    /// Returns the number of entries evicted.
    pub fn evict_overflow(&mut self) -> usize {
        let mut evicted = 0;

        while self.entries.len() > self.max_entries {
            let Some(key) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.usage_bytes -= footprint(&entry);
                evicted += 1;
            }
        }

        self.evictions += evicted as u64;
        evicted
    }

    // == Sweep ==
    /// Purges expired entries, then evicts the LRU surplus.
    pub fn sweep(&mut self) -> SweepReport {
        let expired = self.cleanup_expired();
        let evicted = self.evict_overflow();

        SweepReport {
            expired,
            evicted,
            remaining: self.entries.len(),
        }
    }

    /// Returns the key that would be evicted next.
    pub fn peek_lru(&self) -> Option<&String> {
        self.lru.peek_oldest()
    }

    /// Returns entry metadata without counting it as an access.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Length ==
    /// Returns the current number of entries in the store.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Approximate bytes held: keys, encoded values and per-entry overhead.
    pub fn memory_usage_bytes(&self) -> usize {
        self.usage_bytes
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn expirations(&self) -> u64 {
        self.expirations
    }

    fn purge_if_expired(&mut self, key: &str) -> bool {
        let expired = self.entries.get(key).is_some_and(CacheEntry::is_expired);
        if expired {
            self.remove_entry(key);
            self.expirations += 1;
        }
        expired
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.usage_bytes -= footprint(&entry);
        Some(entry)
    }
}

fn footprint(entry: &CacheEntry) -> usize {
    entry.key.len() + entry.size_bytes + ENTRY_OVERHEAD_BYTES
}
