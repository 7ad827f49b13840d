//! Leading-edge sampling throttle for cursor broadcast.
//!
//! The first call in a window wins; later calls inside the window are
//! rejected outright rather than deferred.

use std::time::{Duration, Instant};

/// Default minimum spacing between accepted cursor sends.
pub const DEFAULT_CURSOR_INTERVAL_MS: u64 = 80;

#[derive(Clone, Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Accept or reject a call made at `now`.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last
            && now.saturating_duration_since(last) < self.interval
        {
            return false;
        }
        self.last = Some(now);
        true
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_CURSOR_INTERVAL_MS))
    }
}

#[cfg(test)]
#[path = "throttle_test.rs"]
mod throttle_test;
