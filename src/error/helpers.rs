//! Helper functions for creating and inspecting errors

use super::types::{CircuitBreakerError, ResilienceError};

/// Helper functions for creating specific errors
impl ResilienceError {
    pub fn operation<N: Into<String>, S: Into<String>>(name: N, message: S) -> Self {
        Self::Operation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    pub fn agent<S: Into<String>>(message: S) -> Self {
        Self::Agent(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    pub fn no_fallback<S: Into<String>>(service: S) -> Self {
        Self::NoFallback(service.into())
    }
}

impl ResilienceError {
    /// Error class name, matched against retry allow/deny lists
    pub fn name(&self) -> &str {
        match self {
            Self::CircuitBreaker(CircuitBreakerError::Open { .. }) => "CircuitBreakerError",
            Self::CircuitBreaker(CircuitBreakerError::Timeout { .. }) => "TimeoutError",
            Self::RetryExhausted { .. } => "RetryableError",
            Self::NonRetryable { .. } => "NonRetryableError",
            Self::Operation { name, .. } => name,
            Self::Timeout(_) => "TimeoutError",
            Self::Agent(_) => "AgentError",
            Self::NoFallback(_) => "NoFallbackError",
            Self::Config(_) => "ConfigError",
            Self::Serialization(_) => "SerializationError",
            Self::Yaml(_) => "YamlError",
            Self::Io(_) => "IoError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Whether the error is a circuit breaker rejection (not a real failure)
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitBreaker(CircuitBreakerError::Open { .. }))
    }

    /// Whether the error represents an exceeded deadline
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::CircuitBreaker(CircuitBreakerError::Timeout { .. })
        )
    }

    /// The innermost cause, unwrapping retry wrappers
    pub fn root_cause(&self) -> &ResilienceError {
        match self {
            Self::RetryExhausted { source, .. } | Self::NonRetryable { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}
