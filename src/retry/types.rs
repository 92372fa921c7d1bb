//! Types and configurations for retry handling

use crate::config::defaults::*;
use crate::error::ResilienceError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Maps an attempt number to the delay before the next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
    ExponentialJitter,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_strategy")]
    pub strategy: BackoffStrategy,
    /// Backoff multiplier
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound of the random jitter added by `exponential_jitter` (milliseconds)
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
    /// Error names or message fragments worth retrying; empty means all
    #[serde(default)]
    pub retryable_errors: Vec<String>,
    /// Error names or message fragments never retried, checked first
    #[serde(default = "default_non_retryable_errors")]
    pub non_retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            strategy: default_backoff_strategy(),
            multiplier: default_multiplier(),
            jitter_max_ms: default_jitter_max_ms(),
            retryable_errors: Vec::new(),
            non_retryable_errors: default_non_retryable_errors(),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with random jitter
    pub fn exponential_jitter(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            strategy: BackoffStrategy::ExponentialJitter,
            ..Self::default()
        }
    }

    /// Delay grows by `initial_delay` each attempt
    pub fn linear(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            strategy: BackoffStrategy::Linear,
            multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Same delay before every retry
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: delay.as_millis() as u64,
            strategy: BackoffStrategy::Fixed,
            ..Self::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Deny-list first; an empty allow-list retries anything not denied
    pub fn is_retryable(&self, error: &ResilienceError) -> bool {
        let name = error.name();
        let message = error.to_string();
        let matches = |pattern: &String| name == pattern || message.contains(pattern.as_str());

        if self.non_retryable_errors.iter().any(|p| matches(p)) {
            return false;
        }
        self.retryable_errors.is_empty() || self.retryable_errors.iter().any(|p| matches(p))
    }
}

/// Successful outcome of a retried operation
#[derive(Debug)]
pub struct RetryResult<T> {
    pub result: T,
    /// Attempts taken, including the successful one
    pub attempts: u32,
    /// Time from the first attempt to success, including delays
    pub total_time: Duration,
    /// Errors of the failed attempts, oldest first
    pub errors: Vec<ResilienceError>,
}

impl<T> RetryResult<T> {
    pub fn into_inner(self) -> T {
        self.result
    }

    /// Whether success needed at least one retry
    pub fn recovered(&self) -> bool {
        self.attempts > 1
    }
}

/// Cumulative statistics of a retry handler
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryStats {
    pub total_executions: u64,
    /// Retries performed (attempts after the first)
    pub total_retries: u64,
    pub success_after_retry: u64,
    pub ultimate_failures: u64,
    pub average_attempts: f64,
    pub average_time_ms: f64,
    /// Failed attempts by error name
    pub error_counts: HashMap<String, u64>,
}

impl RetryStats {
    pub(crate) fn record_completion(&mut self, attempts: u32, elapsed: Duration) {
        self.total_executions += 1;
        let n = self.total_executions as f64;
        self.average_attempts += (attempts as f64 - self.average_attempts) / n;
        self.average_time_ms += (elapsed.as_secs_f64() * 1000.0 - self.average_time_ms) / n;
    }
}
