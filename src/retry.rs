use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::ErrorCategory;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries for retryable, non-timeout categories.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Separate retry budget for timeouts.
    #[serde(default = "default_timeout_retries")]
    pub timeout_retries: u32,
    /// Base delay in milliseconds between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_timeout_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_retries: default_timeout_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Highest retry count any job can reach under this config.
    pub fn retry_ceiling(&self) -> u32 {
        self.max_retries.max(self.timeout_retries)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

pub struct RetryPolicy;

impl RetryPolicy {
    /// Decide the next step after `attempts_so_far` failed attempts.
    ///
    /// - Timeouts retry while `attempts_so_far <= timeout_retries` with a flat delay.
    /// - Other retryable categories retry while `attempts_so_far <= max_retries`,
    ///   with `delay = retry_delay * attempts_so_far`.
    /// - Everything else gives up.
    pub fn next(category: ErrorCategory, attempts_so_far: u32, config: &RetryConfig) -> RetryDecision {
        if category == ErrorCategory::Timeout {
            if attempts_so_far <= config.timeout_retries {
                return RetryDecision::Retry {
                    delay: config.retry_delay(),
                };
            }
            return RetryDecision::GiveUp;
        }

        if category.is_retryable() && attempts_so_far <= config.max_retries {
            return RetryDecision::Retry {
                delay: config.retry_delay().saturating_mul(attempts_so_far),
            };
        }

        RetryDecision::GiveUp
    }
}
