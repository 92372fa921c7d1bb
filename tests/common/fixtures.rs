//! Configuration and metrics fixtures
//!
//! Factories return real configuration values with thresholds small enough
//! to trip in a handful of calls.

use agent_resilience::breaker::{CircuitBreakerConfig, CircuitState};
use agent_resilience::degradation::SystemMetrics;
use agent_resilience::recovery::{RecoveryConfig, ResilientAgentConfig};
use agent_resilience::retry::RetryConfig;
use std::time::Duration;

/// Factory for component configurations
pub struct ConfigFactory;

impl ConfigFactory {
    /// Breaker tripping after `failure_threshold` failures, closing after two
    /// half-open successes, probing again after one second
    pub fn breaker(name: &str, failure_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            success_threshold: 2,
            timeout_ms: 500,
            recovery_timeout_ms: 1000,
            volume_threshold: 100,
            ..CircuitBreakerConfig::named(name)
        }
    }

    /// Fixed 10ms retry delays
    pub fn retry(max_attempts: u32) -> RetryConfig {
        RetryConfig::fixed(max_attempts, Duration::from_millis(10))
    }

    /// Recovery with fixed 10ms backoff and the given inline attempts
    pub fn recovery(inline_attempts: u32, agent_failure_threshold: u32) -> RecoveryConfig {
        RecoveryConfig {
            agent_failure_threshold,
            backoff: Self::retry(3),
            resilient_agent: ResilientAgentConfig {
                inline_attempts,
                inline_retry_delay_ms: 10,
                max_concurrent_tasks: 1,
            },
            ..RecoveryConfig::default()
        }
    }
}

/// Factory for metrics snapshots
pub struct MetricsFactory;

impl MetricsFactory {
    pub fn with_error_rate(error_rate: f64) -> SystemMetrics {
        SystemMetrics {
            error_rate,
            ..SystemMetrics::default()
        }
    }

    pub fn with_open_breakers(count: usize) -> SystemMetrics {
        let mut metrics = SystemMetrics::default();
        for i in 0..count {
            metrics
                .circuit_breakers
                .insert(format!("service-{i}"), CircuitState::Open);
        }
        metrics
    }
}
