//! Cancellable timer tasks.
//!
//! A [`TimerHandle`] owns a spawned task and the token that stops it.
//! Cancelling consumes the handle, so a timer is cancelled at most once;
//! dropping the handle cancels as well.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to a running one-shot or periodic timer.
#[derive(Debug)]
pub struct TimerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer. The callback will not be invoked again.
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the timer task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Invoke `f` once after `delay`.
pub fn after<F>(delay: Duration, f: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        tokio::select! {
            () = time::sleep(delay) => f(),
            () = token.cancelled() => {}
        }
    });
    TimerHandle { cancel, task }
}

/// Shortest period [`every`] will tick at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Invoke `f` every `period`, first after one full period.
///
/// Periods shorter than [`MIN_PERIOD`] (including zero) are raised to it.
pub fn every<F>(period: Duration, mut f: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => f(),
                () = token.cancelled() => break,
            }
        }
    });
    TimerHandle { cancel, task }
}
