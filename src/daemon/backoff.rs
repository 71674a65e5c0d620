//! Retry policy shared by every outbound send.

use std::time::Duration;

/// Bounded exponential retry.
///
/// Attempt `k` (0-based) that fails waits `min(base * 2^k, max)` before the
/// next attempt. Nothing is waited after the final attempt, so the total
/// backoff for one send is at most `(max_attempts - 1) * max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base: Duration::from_millis(250),
            max: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// The fixed-delay flavour: every retry waits `delay`.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base: delay,
            max: delay,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(*self)
    }

    /// Upper bound on time spent sleeping across one send.
    pub fn max_total_delay(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for(attempt))
            .sum()
    }
}

/// Per-send backoff state.
#[derive(Clone, Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(policy: RetryPolicy) -> Self {
        let current = policy.base.min(policy.max);
        Self {
            base: policy.base,
            max: policy.max,
            current,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = self.current.checked_mul(2).unwrap_or(self.max);
        self.current = next.min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base.min(self.max);
    }
}
