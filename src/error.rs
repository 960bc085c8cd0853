//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Errors surfaced to callers of the cache.
///
/// Only malformed input and bad configuration reach the caller; tier
/// failures are downgraded to misses inside the coordinator.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or exceeds the maximum length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Remote Error Enum ==
/// Failures reported by a remote store implementation.
///
/// These stay inside the remote tier adapter, which turns them into
/// misses and no-ops.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Network or protocol error from Redis
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    /// Call did not complete within the command timeout
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// No live connection is held
    #[error("not connected")]
    NotConnected,

    /// Any other backend failure
    #[error("{0}")]
    Other(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
