//! Retry policy with exponential backoff.

use std::time::Duration;

use crate::FailureCause;

/// Retry configuration for one dependency.
///
/// A call makes at most `max_retries + 1` attempts. Before retry `n` (1-based)
/// the client waits `base_delay × 2^(n-1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff base delay.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy with exponential backoff.
    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Create a policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Total number of attempts a call may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Decide what to do after `attempt` failed with `cause`.
    pub fn decide(&self, attempt: u32, cause: &FailureCause) -> RetryDecision {
        if !cause.is_retryable() {
            RetryDecision::Terminal
        } else if attempt >= self.max_attempts() {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Retry(self.delay_for_attempt(attempt))
        }
    }

    /// Sum of every backoff delay a fully failing call waits.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries)
            .map(|attempt| self.delay_for_attempt(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Outcome of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then try again.
    Retry(Duration),
    /// Retryable failure, but the attempt budget is spent.
    Exhausted,
    /// The failure must not be retried.
    Terminal,
}
