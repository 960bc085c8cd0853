//! Connection State Machine
//!
//! Tracks the remote tier's connection lifecycle. Transitions are driven
//! purely by call outcomes:
//!
//! ```text
//! Disconnected --begin_connect--> Connecting --on_success--> Connected
//! Connecting | Connected --on_failure--> Disconnected (attempt += 1)
//!                                    \--> Disabled    (attempt >= max)
//! Disabled --reset--> Disconnected
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

// == Connection State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Gave up after too many consecutive failures
    Disabled,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

// == Connection Status ==
/// Snapshot of the tracker, exposed through health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

// == Connection Tracker ==
#[derive(Debug)]
pub struct ConnectionTracker {
    state: ConnectionState,
    /// Consecutive failures since the last successful connect
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    /// Earliest time the next reconnect may start
    next_attempt_at: Option<Instant>,
}

impl ConnectionTracker {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            max_attempts,
            base_delay,
            max_delay,
            next_attempt_at: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            attempt: self.attempt,
            max_attempts: self.max_attempts,
        }
    }

    // == Begin Connect ==
    /// Moves `Disconnected → Connecting` if the backoff window has passed.
    ///
    /// Returns false when a connect must not start now.
    pub fn begin_connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }

        if let Some(at) = self.next_attempt_at {
            if Instant::now() < at {
                return false;
            }
        }

        self.state = ConnectionState::Connecting;
        true
    }

    // == On Success ==
    pub fn on_success(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempt = 0;
        self.next_attempt_at = None;
    }

    // == On Failure ==
    /// Records a failed call or connect and returns the resulting state.
    ///
    /// Failures observed while already disconnected or disabled are not
    /// counted again.
    pub fn on_failure(&mut self) -> ConnectionState {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                self.attempt += 1;
                if self.attempt >= self.max_attempts {
                    self.state = ConnectionState::Disabled;
                    self.next_attempt_at = None;
                } else {
                    self.state = ConnectionState::Disconnected;
                    self.next_attempt_at = Some(Instant::now() + self.backoff());
                }
            }
            ConnectionState::Disconnected | ConnectionState::Disabled => {}
        }
        self.state
    }

    // == Reset ==
    /// Clears failure history so a connect can start immediately.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.attempt = 0;
        self.next_attempt_at = None;
    }

    pub fn disable(&mut self) {
        self.state = ConnectionState::Disabled;
        self.next_attempt_at = None;
    }

    /// Delay before the next reconnect: `min(attempt * base, max)`.
    pub fn backoff(&self) -> Duration {
        self.base_delay
            .saturating_mul(self.attempt)
            .min(self.max_delay)
    }
}
