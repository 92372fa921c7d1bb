//! Error types for the resilience core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for the resilience core
pub type Result<T> = std::result::Result<T, ResilienceError>;

/// Failures raised by a circuit breaker while protecting an operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CircuitBreakerError {
    /// The circuit is open and the recovery window has not elapsed
    #[error("Circuit breaker '{name}' is open, retry after {retry_after:?}")]
    Open {
        name: String,
        retry_after: Duration,
    },

    /// The protected operation did not settle within its deadline
    #[error("Operation protected by '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Main error type for the resilience core
#[derive(Error, Debug)]
pub enum ResilienceError {
    /// Rejected or timed out by a circuit breaker
    #[error("Circuit breaker error: {0}")]
    CircuitBreaker(#[from] CircuitBreakerError),

    /// Attempt budget exhausted, last cause attached
    #[error("Retry exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ResilienceError>,
    },

    /// Error class explicitly denied for retry, cause attached
    #[error("Non-retryable error after {attempts} attempts: {source}")]
    NonRetryable {
        attempts: u32,
        #[source]
        source: Box<ResilienceError>,
    },

    /// Failure reported by a wrapped operation
    #[error("{name}: {message}")]
    Operation { name: String, message: String },

    /// Deadline exceeded outside of a circuit breaker
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Agent failures
    #[error("Agent error: {0}")]
    Agent(String),

    /// No fallback could be found for a service
    #[error("No fallback available for service '{0}'")]
    NoFallback(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
