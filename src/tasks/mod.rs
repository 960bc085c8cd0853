//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - Cleanup: purges expired memory entries and evicts the LRU surplus

mod cleanup;

pub use cleanup::CleanupScheduler;
