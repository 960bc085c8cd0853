//! Remote Tier Module
//!
//! Network-backed shared cache behind a trait seam, the Redis
//! implementation, and the adapter that keeps outages from reaching callers.

mod state;
mod store;
mod tier;

pub use state::{ConnectionState, ConnectionStatus, ConnectionTracker};
pub use store::{RedisStore, RemoteStore};
pub use tier::{RemoteOutcome, RemoteTier};
