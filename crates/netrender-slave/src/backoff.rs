//! Cancellable incremental backoff.
//!
//! Failed connects and empty polls sleep a growing interval: it starts at
//! a base value, grows linearly by a fixed step up to a cap, and resets to
//! the base whenever a job is assigned. The sleep itself aborts as soon as
//! the cancellation channel fires; cancellation is only ever observed
//! between blocking operations, never by preempting one.

use std::time::Duration;

use tokio::sync::watch;

use netrender_core::config::slave::SlaveConfig;

/// A linearly growing, capped, resettable sleep interval.
#[derive(Debug, Clone)]
pub struct IncrementalBackoff {
    base: Duration,
    step: Duration,
    cap: Duration,
    current: Duration,
}

impl IncrementalBackoff {
    /// Create a backoff starting at `base`, growing by `step` per failed
    /// attempt, never exceeding `cap`.
    pub fn new(base: Duration, step: Duration, cap: Duration) -> Self {
        let cap = cap.max(base);
        Self {
            base,
            step,
            cap,
            current: base,
        }
    }

    /// Build from the slave configuration.
    pub fn from_config(config: &SlaveConfig) -> Self {
        Self::new(
            Duration::from_secs(config.backoff_base_seconds),
            Duration::from_secs(config.backoff_step_seconds),
            Duration::from_secs(config.backoff_cap_seconds),
        )
    }

    /// The interval the next wait will sleep.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the current interval and advance to the next one.
    pub fn next_interval(&mut self) -> Duration {
        let interval = self.current;
        self.current = (self.current + self.step).min(self.cap);
        interval
    }

    /// Drop back to the base interval (called on every job assignment).
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Sleep the current interval, growing it for next time.
    ///
    /// Returns `false` if cancellation fired before the sleep finished
    /// (or was already requested when the wait began).
    pub async fn wait(&mut self, cancel: &mut watch::Receiver<bool>) -> bool {
        if *cancel.borrow() {
            return false;
        }
        let interval = self.next_interval();
        tokio::select! {
            changed = cancel.changed() => {
                // A closed channel means the daemon is going away.
                changed.is_ok() && !*cancel.borrow()
            }
            _ = tokio::time::sleep(interval) => true,
        }
    }
}
