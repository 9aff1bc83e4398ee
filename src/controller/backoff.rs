//! # Exponential Backoff
//!
//! Bounded exponential backoff used between watch re-open attempts.
//!
//! Each call doubles the delay until it reaches the cap; a successful
//! read resets it.
//!
//! ## Usage
//!
//! ```rust
//! use kube_secret_sync::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(2));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(500));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
//! ```

use std::time::Duration;

/// Exponential backoff calculator
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// First delay, and the value restored by [`reset`](Self::reset)
    start: Duration,
    current: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `start` and never exceeding `max`
    #[must_use]
    pub fn new(start: Duration, max: Duration) -> Self {
        let start = start.min(max);
        Self {
            start,
            current: start,
            max,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current = self.start;
    }
}
