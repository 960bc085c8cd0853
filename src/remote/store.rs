//! Remote Store Module
//!
//! The seam between the adapter and a network-backed shared cache, with
//! the Redis implementation.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, IntoConnectionInfo};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::RemoteConfig;
use crate::error::RemoteError;

// == Remote Store Trait ==
/// Raw operations on a shared cache. Values are opaque bytes; TTLs are
/// whole seconds.
///
/// Implementations report every failure as an error. Connection-state
/// bookkeeping and timeouts live in [`RemoteTier`](super::RemoteTier).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Establishes (or re-establishes) the connection and verifies it.
    async fn connect(&self) -> Result<(), RemoteError>;

    /// Drops any held connection.
    async fn disconnect(&self);

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError>;

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), RemoteError>;

    /// Returns true if a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, RemoteError>;

    async fn exists(&self, key: &str) -> Result<bool, RemoteError>;

    /// Adds `delta` to an integer counter, creating it at zero first.
    async fn increment_by(&self, key: &str, delta: i64) -> Result<i64, RemoteError>;

    /// Returns true if the key existed and its TTL was set.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, RemoteError>;

    /// Counts the keys this store owns.
    async fn size(&self) -> Result<u64, RemoteError>;

    /// Removes every key this store owns; returns how many were removed.
    async fn clear_prefix(&self) -> Result<u64, RemoteError>;

    fn name(&self) -> &'static str;
}

// == Redis Store ==
/// Redis-backed store using a multiplexed tokio connection.
pub struct RedisStore {
    client: redis::Client,
    key_prefix: String,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Builds a client for the configured endpoint without connecting.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let mut info = config.url.as_str().into_connection_info()?;
        if let Some(password) = &config.password {
            info.redis.password = Some(password.clone());
        }

        Ok(Self {
            client: redis::Client::open(info)?,
            key_prefix: config.key_prefix.clone(),
            conn: Mutex::new(None),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, RemoteError> {
        self.conn.lock().await.clone().ok_or(RemoteError::NotConnected)
    }

    /// One page of keys under the prefix. SCAN rather than KEYS, so a large
    /// keyspace never blocks the server.
    async fn scan_prefix(
        &self,
        conn: &mut MultiplexedConnection,
        cursor: u64,
    ) -> Result<(u64, Vec<String>), RemoteError> {
        let page: (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{}*", self.key_prefix))
            .arg("COUNT")
            .arg(100)
            .query_async(conn)
            .await?;
        Ok(page)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn connect(&self) -> Result<(), RemoteError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        *self.conn.lock().await = Some(conn);
        info!(prefix = %self.key_prefix, "Redis connection established");
        Ok(())
    }

    async fn disconnect(&self) {
        if self.conn.lock().await.take().is_some() {
            debug!("Redis connection released");
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        let mut conn = self.connection().await?;
        let data: Option<Vec<u8>> = conn.get(self.full_key(key)).await?;
        Ok(data)
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), RemoteError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(self.full_key(key), value, ttl_secs)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, RemoteError> {
        let mut conn = self.connection().await?;
        let deleted: i64 = conn.del(self.full_key(key)).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, RemoteError> {
        let mut conn = self.connection().await?;
        let exists: bool = conn.exists(self.full_key(key)).await?;
        Ok(exists)
    }

    async fn increment_by(&self, key: &str, delta: i64) -> Result<i64, RemoteError> {
        let mut conn = self.connection().await?;
        let value: i64 = conn.incr(self.full_key(key), delta).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, RemoteError> {
        let mut conn = self.connection().await?;
        let secs = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let applied: bool = conn.expire(self.full_key(key), secs).await?;
        Ok(applied)
    }

    async fn size(&self) -> Result<u64, RemoteError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut total: u64 = 0;

        loop {
            let (next, keys) = self.scan_prefix(&mut conn, cursor).await?;
            total += keys.len() as u64;

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(total)
    }

    async fn clear_prefix(&self) -> Result<u64, RemoteError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut total_deleted: u64 = 0;

        loop {
            let (next, keys) = self.scan_prefix(&mut conn, cursor).await?;

            if !keys.is_empty() {
                let deleted: i64 = conn.del(&keys).await?;
                total_deleted += deleted.max(0) as u64;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(total_deleted)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
