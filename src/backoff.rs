//! Reconnect delay schedule.
//!
//! Delays start at `initial`, grow by `factor` per attempt and never exceed
//! `max`. A successful open resets the schedule so a long outage does not
//! leave the next disconnect waiting at the cap.

use std::time::Duration;

/// Default first reconnect delay.
pub const DEFAULT_INITIAL_MS: u64 = 1000;
/// Default growth per attempt.
pub const DEFAULT_FACTOR: f64 = 1.5;
/// Default delay cap.
pub const DEFAULT_MAX_MS: u64 = 10_000;

const MAX_FACTOR: f64 = 10.0;

/// Parameters of the reconnect schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first reconnect attempt.
    pub initial: Duration,
    /// Multiplier applied after every attempt.
    pub factor: f64,
    /// Upper bound on any delay.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(DEFAULT_INITIAL_MS),
            factor: DEFAULT_FACTOR,
            max: Duration::from_millis(DEFAULT_MAX_MS),
        }
    }
}

impl BackoffPolicy {
    /// A fixed-delay policy (every attempt waits `delay`).
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            factor: 1.0,
            max: delay,
        }
    }

    /// Clamp out-of-range parameters: the factor into `[1, 10]`, a zero
    /// initial delay or cap back to its default, and the initial delay to at
    /// most the cap.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let factor = if self.factor.is_finite() {
            self.factor.clamp(1.0, MAX_FACTOR)
        } else {
            DEFAULT_FACTOR
        };
        let max = non_zero_or(self.max, DEFAULT_MAX_MS);
        Self {
            initial: non_zero_or(self.initial, DEFAULT_INITIAL_MS).min(max),
            factor,
            max,
        }
    }
}

fn non_zero_or(delay: Duration, default_ms: u64) -> Duration {
    if delay.is_zero() {
        Duration::from_millis(default_ms)
    } else {
        delay
    }
}

/// Stateful reconnect schedule.
#[derive(Clone, Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    /// Start a schedule at the policy's initial delay.
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        let policy = policy.sanitized();
        Self {
            policy,
            current: policy.initial,
        }
    }

    /// Take the delay for the next attempt and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.policy.factor)
            .unwrap_or(self.policy.max);
        self.current = grown.min(self.policy.max);
        delay
    }

    /// Delay the next attempt would use, without advancing.
    #[cfg(test)]
    #[must_use]
    pub fn peek(&self) -> Duration {
        self.current
    }

    /// Return to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod backoff_test;
