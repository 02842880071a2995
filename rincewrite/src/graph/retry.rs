//! Retry policies for node execution and checkpoint writes.

use std::time::Duration;

/// Retry policy for handling transient failures.
///
/// `attempt` counts retries already made, starting at 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RetryPolicy {
    /// Fail immediately on error.
    #[default]
    None,
    /// Retry with a constant delay between attempts.
    Fixed {
        max_attempts: usize,
        interval: Duration,
    },
    /// Retry with exponentially increasing delays, capped at `max_interval`.
    Exponential {
        max_attempts: usize,
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
    },
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy::None
    }

    pub fn fixed(max_attempts: usize, interval: Duration) -> Self {
        RetryPolicy::Fixed {
            max_attempts,
            interval,
        }
    }

    pub fn exponential(
        max_attempts: usize,
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
    ) -> Self {
        RetryPolicy::Exponential {
            max_attempts,
            initial_interval,
            max_interval,
            multiplier,
        }
    }

    /// Policy used for checkpoint writes unless the graph overrides it:
    /// three retries starting at 50ms, doubling, capped at 1s.
    pub fn store_default() -> Self {
        RetryPolicy::exponential(3, Duration::from_millis(50), Duration::from_secs(1), 2.0)
    }

    /// Returns `true` if another retry is allowed after `attempt` retries.
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts()
    }

    /// Delay before retry number `attempt`.
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { interval, .. } => *interval,
            RetryPolicy::Exponential {
                initial_interval,
                max_interval,
                multiplier,
                ..
            } => {
                let delay_secs = initial_interval.as_secs_f64() * multiplier.powi(attempt as i32);
                Duration::from_secs_f64(delay_secs).min(*max_interval)
            }
        }
    }

    pub fn max_attempts(&self) -> usize {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_attempts, .. } => *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }
}
