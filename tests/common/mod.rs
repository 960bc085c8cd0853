//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tiered_cache::{CacheConfig, RemoteError, RemoteStore, TieredCache};
use tokio::time::Instant;

/// In-process stand-in for Redis that can be switched off mid-test.
#[derive(Default)]
pub struct FakeRemote {
    data: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
    down: AtomicBool,
    hang_connect: AtomicBool,
    pub connects: AtomicU32,
    pub calls: AtomicU32,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Makes `connect` never complete, like a host that drops packets.
    pub fn set_hang_connect(&self, hang: bool) {
        self.hang_connect.store(hang, Ordering::SeqCst);
    }

    /// Writes directly, bypassing the cache (as another instance would).
    pub fn seed(&self, key: &str, raw: &str, ttl: Duration) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), (raw.as_bytes().to_vec(), Instant::now() + ttl));
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.live(key).map(|bytes| String::from_utf8(bytes).unwrap())
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            Err(RemoteError::Other("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn live(&self, key: &str) -> Option<Vec<u8>> {
        let mut data = self.data.lock().unwrap();
        match data.get(key) {
            Some((_, expires)) if Instant::now() >= *expires => {
                data.remove(key);
                None
            }
            Some((bytes, _)) => Some(bytes.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn connect(&self) -> Result<(), RemoteError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.check()
    }

    async fn disconnect(&self) {}

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        self.check()?;
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), RemoteError> {
        self.check()?;
        let expires = Instant::now() + Duration::from_secs(ttl_secs);
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_vec(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, RemoteError> {
        self.check()?;
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, RemoteError> {
        self.check()?;
        Ok(self.live(key).is_some())
    }

    async fn increment_by(&self, key: &str, delta: i64) -> Result<i64, RemoteError> {
        self.check()?;
        let current: i64 = self
            .live(key)
            .and_then(|b| String::from_utf8(b).ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let next = current + delta;
        let far = Instant::now() + Duration::from_secs(86_400 * 365);
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), (next.to_string().into_bytes(), far));
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, RemoteError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        match data.get_mut(key) {
            Some(entry) => {
                entry.1 = Instant::now() + Duration::from_secs(ttl_secs);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn size(&self) -> Result<u64, RemoteError> {
        self.check()?;
        let now = Instant::now();
        let data = self.data.lock().unwrap();
        Ok(data.values().filter(|(_, expires)| now < *expires).count() as u64)
    }

    async fn clear_prefix(&self) -> Result<u64, RemoteError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        let count = data.len() as u64;
        data.clear();
        Ok(count)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Routes cache logs to the test harness; set RUST_LOG to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(max_entries: usize, default_ttl_ms: u64) -> CacheConfig {
    let mut config = CacheConfig {
        max_memory_entries: max_entries,
        default_ttl: Duration::from_millis(default_ttl_ms),
        ..CacheConfig::default()
    };
    config.remote.command_timeout = Duration::from_millis(200);
    config.remote.max_reconnect_attempts = 3;
    config
}

pub fn tiered(config: CacheConfig, remote: &Arc<FakeRemote>) -> TieredCache {
    TieredCache::with_remote_store(config, remote.clone()).unwrap()
}
