//! Heartbeat ping scheduling.
//!
//! The monitor only emits pings. It never waits for or validates the
//! server's `pong`; a dead peer is detected when the socket itself reports
//! closure.

use std::time::Duration;

use crate::timer::{self, TimerHandle};

/// Periodic ping emitter for an open connection.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    timer: Option<TimerHandle>,
}

impl HeartbeatMonitor {
    /// Create a stopped monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `ping_fn` every `interval`, replacing any running schedule.
    pub fn start<F>(&mut self, interval: Duration, ping_fn: F)
    where
        F: FnMut() + Send + 'static,
    {
        let _ = self.stop();
        self.timer = Some(timer::every(interval, ping_fn));
    }

    /// Halt future pings. Returns whether a schedule was running.
    pub fn stop(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a schedule is active.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }
}
