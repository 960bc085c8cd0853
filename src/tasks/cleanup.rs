//! Cleanup Scheduler
//!
//! Background task that periodically purges expired memory entries and
//! evicts the least recently used surplus.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryStore;

/// Handle to the running sweep task.
///
/// Dropping the scheduler stops the task.
#[derive(Debug)]
pub struct CleanupScheduler {
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl CleanupScheduler {
    /// Spawns a task that sweeps the memory tier every `interval`.
    ///
    /// Each pass holds the store's write lock for its duration, so a sweep
    /// never interleaves with a read or write on the same entry.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Example
    /// ```ignore
    /// let memory = Arc::new(RwLock::new(MemoryStore::new(1000)));
    /// let mut scheduler = CleanupScheduler::spawn(memory.clone(), Duration::from_secs(60));
    /// // Later, during shutdown:
    /// scheduler.stop();
    /// ```
    pub fn spawn(memory: Arc<RwLock<MemoryStore>>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
            info!(interval_ms, "Starting cache cleanup task");

            loop {
                tokio::time::sleep(interval).await;

                let report = {
                    let mut store = memory.write().await;
                    store.sweep()
                };

                if report.expired > 0 || report.evicted > 0 {
                    info!(
                        expired = report.expired,
                        evicted = report.evicted,
                        remaining = report.remaining,
                        "Cache cleanup removed {} entries",
                        report.expired + report.evicted
                    );
                } else {
                    debug!(remaining = report.remaining, "Cache cleanup: nothing to remove");
                }
            }
        });

        Self {
            handle: Some(handle),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    // == Stop ==
    /// Aborts the task. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Cache cleanup task stopped");
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
