//! Reconnection backoff.
//!
//! Delays come from a fixed ascending table indexed by zero-based attempt
//! number. Past the end of the table the delay saturates at a ceiling.
//! The scheduler owns the attempt counter and gives up once it exceeds the
//! configured maximum.

use std::time::Duration;

use classlink_settings::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_CEILING_MS, DEFAULT_RECONNECT_DELAYS_MS,
};

/// Delay table, ceiling, and attempt bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delays: Vec<Duration>,
    ceiling: Duration,
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delays: DEFAULT_RECONNECT_DELAYS_MS
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
            ceiling: Duration::from_millis(DEFAULT_RECONNECT_CEILING_MS),
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Build a policy from an explicit table.
    pub fn new(delays: Vec<Duration>, ceiling: Duration, max_attempts: u32) -> Self {
        Self {
            delays,
            ceiling,
            max_attempts,
        }
    }

    /// Same table and ceiling, different attempt bound.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before the reconnect with zero-based index `attempt_index`.
    pub fn next_delay(&self, attempt_index: u32) -> Duration {
        usize::try_from(attempt_index)
            .ok()
            .and_then(|i| self.delays.get(i))
            .copied()
            .unwrap_or(self.ceiling)
    }

    /// Unexpected closures tolerated before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// What to do after an unexpected closure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Dial again after `delay`.
    Retry {
        /// One-based count of consecutive failures so far.
        attempt: u32,
        /// How long to wait before dialing.
        delay: Duration,
    },
    /// The bound is exceeded; stop reconnecting.
    GiveUp {
        /// Consecutive failures counted.
        attempts: u32,
    },
}

/// Counts consecutive unexpected closures and maps them to delays.
#[derive(Clone, Debug, Default)]
pub struct ReconnectScheduler {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectScheduler {
    /// Create a scheduler with a zeroed counter.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Count one more unexpected closure and decide what happens next.
    pub fn register_failure(&mut self) -> ReconnectDecision {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > self.policy.max_attempts {
            ReconnectDecision::GiveUp {
                attempts: self.attempts,
            }
        } else {
            ReconnectDecision::Retry {
                attempt: self.attempts,
                delay: self.policy.next_delay(self.attempts - 1),
            }
        }
    }

    /// Zero the counter after a successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consecutive unexpected closures since the last open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The policy in force.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}
