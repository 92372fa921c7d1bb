//! Default value functions for configuration

use crate::logging::LogFormat;
use crate::retry::BackoffStrategy;
use std::time::Duration;

/// Shortest period accepted by background timers
pub const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

pub fn default_true() -> bool {
    true
}

// Circuit breaker

pub fn default_failure_threshold() -> u32 {
    5
}

pub fn default_success_threshold() -> u32 {
    3
}

pub fn default_call_timeout_ms() -> u64 {
    30_000
}

pub fn default_recovery_timeout_ms() -> u64 {
    60_000
}

pub fn default_monitoring_period_ms() -> u64 {
    60_000
}

pub fn default_volume_threshold() -> u64 {
    10
}

pub fn default_error_threshold() -> f64 {
    0.5
}

// Retry

pub fn default_max_attempts() -> u32 {
    3
}

pub fn default_initial_delay_ms() -> u64 {
    100
}

pub fn default_max_delay_ms() -> u64 {
    30_000
}

pub fn default_backoff_strategy() -> BackoffStrategy {
    BackoffStrategy::ExponentialJitter
}

pub fn default_multiplier() -> f64 {
    2.0
}

pub fn default_jitter_max_ms() -> u64 {
    100
}

pub fn default_non_retryable_errors() -> Vec<String> {
    [
        "ValidationError",
        "AuthenticationError",
        "AuthorizationError",
        "ConfigError",
        "NonRetryableError",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// Error recovery

pub fn default_agent_failure_threshold() -> u32 {
    5
}

pub fn default_agent_success_threshold() -> u32 {
    1
}

pub fn default_agent_recovery_time_ms() -> u64 {
    60_000
}

pub fn default_recovery_max_attempts() -> u32 {
    3
}

pub fn default_error_history_size() -> usize {
    1000
}

pub fn default_inline_attempts() -> u32 {
    2
}

pub fn default_inline_retry_delay_ms() -> u64 {
    1000
}

pub fn default_max_concurrent_tasks() -> usize {
    5
}

// Health monitoring

pub fn default_health_check_interval_ms() -> u64 {
    30_000
}

pub fn default_health_check_timeout_ms() -> u64 {
    5_000
}

// Degradation

pub fn default_evaluation_interval_ms() -> u64 {
    30_000
}

pub fn default_history_size() -> usize {
    100
}

pub fn default_metrics_window_size() -> usize {
    1000
}

pub fn default_cache_capacity() -> u64 {
    1000
}

pub fn default_cache_ttl_ms() -> u64 {
    300_000
}

// Logging

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> LogFormat {
    LogFormat::Text
}
