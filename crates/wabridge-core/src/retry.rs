//! Retry policy for message delivery.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often, and how patiently, a failed send is retried (`[whatsapp.retry]`).
///
/// The defaults retry exactly once after a fixed two-second pause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause before the second attempt.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Factor applied to the pause after every further failure (1 = fixed delay).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_backoff_multiplier() -> u32 {
    1
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Pause to take after `failed_attempt` (1-based) failed, or `None` when
    /// that was the last allowed attempt.
    pub fn delay_after(&self, failed_attempt: u32) -> Option<Duration> {
        if failed_attempt >= self.max_attempts {
            return None;
        }
        let factor = u64::from(self.backoff_multiplier.max(1))
            .saturating_pow(failed_attempt.saturating_sub(1));
        Some(Duration::from_millis(
            self.initial_delay_ms.saturating_mul(factor),
        ))
    }
}
