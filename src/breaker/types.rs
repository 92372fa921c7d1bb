//! Types and configurations for circuit breakers

use crate::config::defaults::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, allowing probe requests
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(label)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Name of the protected operation
    #[serde(default)]
    pub name: String,
    /// Failure count that opens the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Successes needed in half-open to close the circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Deadline for a single protected call (milliseconds)
    #[serde(default = "default_call_timeout_ms")]
    pub timeout_ms: u64,
    /// Time spent open before probing again (milliseconds)
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
    /// Length of the rolling metrics window (milliseconds)
    #[serde(default = "default_monitoring_period_ms")]
    pub monitoring_period_ms: u64,
    /// Minimum requests in the window before the error rate can trip
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: u64,
    /// Error rate in the window that trips the circuit
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_ms: default_call_timeout_ms(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
            monitoring_period_ms: default_monitoring_period_ms(),
            volume_threshold: default_volume_threshold(),
            error_threshold: default_error_threshold(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Default configuration for a named operation
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    /// Window roll period, never zero
    pub fn monitoring_period(&self) -> Duration {
        Duration::from_millis(self.monitoring_period_ms).max(MIN_TIMER_PERIOD)
    }

    /// Apply caller overrides on top of this configuration
    pub fn merge(mut self, overrides: &BreakerOverrides) -> Self {
        if let Some(v) = overrides.failure_threshold {
            self.failure_threshold = v;
        }
        if let Some(v) = overrides.success_threshold {
            self.success_threshold = v;
        }
        if let Some(v) = overrides.timeout_ms {
            self.timeout_ms = v;
        }
        if let Some(v) = overrides.recovery_timeout_ms {
            self.recovery_timeout_ms = v;
        }
        if let Some(v) = overrides.monitoring_period_ms {
            self.monitoring_period_ms = v;
        }
        if let Some(v) = overrides.volume_threshold {
            self.volume_threshold = v;
        }
        if let Some(v) = overrides.error_threshold {
            self.error_threshold = v;
        }
        self
    }
}

/// Partial configuration supplied when a breaker is created through the manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakerOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_period_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<f64>,
}

/// Counters for the current rolling window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitMetrics {
    /// Calls admitted to the operation
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Failures caused by the call deadline
    pub timeout_count: u64,
    /// Calls rejected while open
    pub rejected_count: u64,
    /// Sum of successful response times (milliseconds)
    pub total_response_time_ms: u64,
    /// When this window started
    pub last_reset_time: DateTime<Utc>,
}

impl Default for CircuitMetrics {
    fn default() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            failure_count: 0,
            timeout_count: 0,
            rejected_count: 0,
            total_response_time_ms: 0,
            last_reset_time: Utc::now(),
        }
    }
}

impl CircuitMetrics {
    /// Failures divided by admitted requests, 0 when idle
    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.request_count as f64
        }
    }

    /// Mean response time of successful calls
    pub fn average_response_time_ms(&self) -> f64 {
        if self.success_count == 0 {
            0.0
        } else {
            self.total_response_time_ms as f64 / self.success_count as f64
        }
    }
}

/// Point-in-time view of a circuit breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    /// Decaying failure counter used by the absolute trip rule
    pub failure_count: u32,
    /// Consecutive successes while half-open
    pub success_count: u32,
    pub metrics: CircuitMetrics,
    pub error_rate: f64,
    pub average_response_time_ms: f64,
    /// Time since the breaker was created (milliseconds)
    pub uptime_ms: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    /// Remaining time before a probe is allowed, only while open
    pub next_attempt_in_ms: Option<u64>,
}
