//! Remote Tier Adapter
//!
//! Wraps a [`RemoteStore`] with per-call timeouts and the connection state
//! machine. Every failure is reported as [`RemoteOutcome::Unavailable`];
//! nothing here returns an error to the coordinator.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::remote::{ConnectionState, ConnectionStatus, ConnectionTracker, RemoteStore};

// == Remote Outcome ==
/// Result of a remote call as seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome<T> {
    Ok(T),
    /// Tier down, disabled, timed out or errored; treat as miss/no-op
    Unavailable,
}

impl<T> RemoteOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            RemoteOutcome::Ok(value) => Some(value),
            RemoteOutcome::Unavailable => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RemoteOutcome::Ok(_))
    }
}

// == Remote Tier ==
pub struct RemoteTier {
    store: Arc<dyn RemoteStore>,
    tracker: Mutex<ConnectionTracker>,
    command_timeout: Duration,
}

impl RemoteTier {
    pub fn new(store: Arc<dyn RemoteStore>, config: &RemoteConfig) -> Self {
        Self {
            store,
            tracker: Mutex::new(ConnectionTracker::new(
                config.max_reconnect_attempts,
                config.reconnect_base_delay,
                config.reconnect_max_delay,
            )),
            command_timeout: config.command_timeout,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.tracker().status()
    }

    pub fn state(&self) -> ConnectionState {
        self.tracker().state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    // == Connect ==
    /// Starts a connect if the state machine allows one now.
    ///
    /// Returns true if the tier is connected afterwards.
    pub async fn connect(&self) -> bool {
        let started = self.tracker().begin_connect();
        if !started {
            return self.is_connected();
        }

        debug!(store = self.store.name(), "Connecting remote tier");
        let result = match timeout(self.command_timeout, self.store.connect()).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.command_timeout)),
        };

        match result {
            Ok(()) => {
                self.tracker().on_success();
                info!(store = self.store.name(), "Remote tier connected");
                true
            }
            Err(err) => {
                self.record_failure("connect", &err).await;
                false
            }
        }
    }

    // == Reconnect ==
    /// Clears failure history (leaving `Disabled` if needed) and connects now.
    pub async fn reconnect(&self) -> bool {
        let previous = {
            let mut tracker = self.tracker();
            let previous = tracker.state();
            if previous != ConnectionState::Connected {
                tracker.reset();
            }
            previous
        };

        if previous == ConnectionState::Connected {
            return true;
        }

        info!(from = %previous, "Remote tier reconnect requested");
        self.connect().await
    }

    // == Shutdown ==
    /// Releases the connection and stops all further attempts.
    pub async fn shutdown(&self) {
        self.tracker().disable();
        self.store.disconnect().await;
        info!(store = self.store.name(), "Remote tier shut down");
    }

    pub async fn get(&self, key: &str) -> RemoteOutcome<Option<Vec<u8>>> {
        let key = key.to_string();
        self.call("get", move |store| async move { store.get(&key).await })
            .await
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> RemoteOutcome<()> {
        let key = key.to_string();
        self.call("set", move |store| async move {
            store.set(&key, &value, ttl_secs).await
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> RemoteOutcome<bool> {
        let key = key.to_string();
        self.call("delete", move |store| async move { store.delete(&key).await })
            .await
    }

    pub async fn exists(&self, key: &str) -> RemoteOutcome<bool> {
        let key = key.to_string();
        self.call("exists", move |store| async move { store.exists(&key).await })
            .await
    }

    pub async fn increment_by(&self, key: &str, delta: i64) -> RemoteOutcome<i64> {
        let key = key.to_string();
        self.call("increment_by", move |store| async move {
            store.increment_by(&key, delta).await
        })
        .await
    }

    pub async fn expire(&self, key: &str, ttl_secs: u64) -> RemoteOutcome<bool> {
        let key = key.to_string();
        self.call("expire", move |store| async move {
            store.expire(&key, ttl_secs).await
        })
        .await
    }

    pub async fn size(&self) -> RemoteOutcome<u64> {
        self.call("size", |store| async move { store.size().await })
            .await
    }

    pub async fn clear_prefix(&self) -> RemoteOutcome<u64> {
        self.call("clear_prefix", |store| async move { store.clear_prefix().await })
            .await
    }

    /// Runs one store call under the timeout, updating connection state.
    async fn call<R, F, Fut>(&self, op: &'static str, f: F) -> RemoteOutcome<R>
    where
        F: FnOnce(Arc<dyn RemoteStore>) -> Fut,
        Fut: Future<Output = Result<R, RemoteError>>,
    {
        if !self.ensure_connected().await {
            debug!(op, state = %self.state(), "Remote tier unavailable, skipping");
            return RemoteOutcome::Unavailable;
        }

        let result = match timeout(self.command_timeout, f(Arc::clone(&self.store))).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.command_timeout)),
        };

        match result {
            Ok(value) => RemoteOutcome::Ok(value),
            Err(err) => {
                self.record_failure(op, &err).await;
                RemoteOutcome::Unavailable
            }
        }
    }

    async fn ensure_connected(&self) -> bool {
        match self.state() {
            ConnectionState::Connected => true,
            ConnectionState::Disconnected => self.connect().await,
            ConnectionState::Connecting | ConnectionState::Disabled => false,
        }
    }

    async fn record_failure(&self, op: &'static str, err: &RemoteError) {
        let (state, attempt, max_attempts) = {
            let mut tracker = self.tracker();
            let state = tracker.on_failure();
            let status = tracker.status();
            (state, status.attempt, status.max_attempts)
        };

        self.store.disconnect().await;

        if state == ConnectionState::Disabled {
            error!(
                op,
                error = %err,
                attempts = attempt,
                "Remote tier disabled after {} consecutive failures; waiting for explicit reconnect",
                max_attempts
            );
        } else {
            warn!(op, error = %err, attempt, max_attempts, "Remote operation failed");
        }
    }

    fn tracker(&self) -> MutexGuard<'_, ConnectionTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
