//! Configuration management for the resilience core
//!
//! This module handles loading, validation, and merging of every component's
//! configuration. Each section deserializes with defaults, so partial files
//! are valid.

pub mod defaults;
pub mod validation;

pub use validation::Validate;

use crate::breaker::CircuitBreakerConfig;
use crate::degradation::DegradationConfig;
use crate::error::{ResilienceError, Result};
use crate::health::HealthMonitorConfig;
use crate::logging::LoggingConfig;
use crate::recovery::RecoveryConfig;
use crate::retry::RetryConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Prefix of every environment variable read by [`ResilienceConfig::from_env`]
pub const ENV_PREFIX: &str = "RESILIENCE_";

/// Main configuration struct for the resilience core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Defaults for breakers created through the manager
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub health: HealthMonitorConfig,
    #[serde(default)]
    pub degradation: DegradationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ResilienceConfig {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ResilienceError::config(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_yaml_str(&content)?;
        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ResilienceError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `RESILIENCE_*` environment variables
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by variables resolved through `lookup`
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        let breaker = &mut config.circuit_breaker;
        env.set("FAILURE_THRESHOLD", &mut breaker.failure_threshold)?;
        env.set("SUCCESS_THRESHOLD", &mut breaker.success_threshold)?;
        env.set("CALL_TIMEOUT_MS", &mut breaker.timeout_ms)?;
        env.set("RECOVERY_TIMEOUT_MS", &mut breaker.recovery_timeout_ms)?;
        env.set("MONITORING_PERIOD_MS", &mut breaker.monitoring_period_ms)?;
        env.set("VOLUME_THRESHOLD", &mut breaker.volume_threshold)?;
        env.set("ERROR_THRESHOLD", &mut breaker.error_threshold)?;

        let retry = &mut config.retry;
        env.set("RETRY_MAX_ATTEMPTS", &mut retry.max_attempts)?;
        env.set("RETRY_INITIAL_DELAY_MS", &mut retry.initial_delay_ms)?;
        env.set("RETRY_MAX_DELAY_MS", &mut retry.max_delay_ms)?;
        env.set("RETRY_MULTIPLIER", &mut retry.multiplier)?;
        env.set_yaml("RETRY_STRATEGY", &mut retry.strategy)?;

        let recovery = &mut config.recovery;
        env.set("AGENT_FAILURE_THRESHOLD", &mut recovery.agent_failure_threshold)?;
        env.set("AGENT_RECOVERY_TIME_MS", &mut recovery.agent_recovery_time_ms)?;
        env.set("RECOVERY_MAX_ATTEMPTS", &mut recovery.max_attempts)?;
        env.set("MAX_CONCURRENT_TASKS", &mut recovery.resilient_agent.max_concurrent_tasks)?;

        env.set("HEALTH_CHECK_INTERVAL_MS", &mut config.health.check_interval_ms)?;
        env.set("HEALTH_CHECK_TIMEOUT_MS", &mut config.health.check_timeout_ms)?;
        env.set("DEGRADATION_INTERVAL_MS", &mut config.degradation.evaluation_interval_ms)?;

        env.set("LOG_LEVEL", &mut config.logging.level)?;
        env.set_yaml("LOG_FORMAT", &mut config.logging.format)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        let sections: [(&str, &dyn Validate); 5] = [
            ("Circuit breaker", &self.circuit_breaker),
            ("Retry", &self.retry),
            ("Recovery", &self.recovery),
            ("Health", &self.health),
            ("Degradation", &self.degradation),
        ];
        for (section, config) in sections {
            config
                .validate()
                .map_err(|e| ResilienceError::config(format!("{} config error: {}", section, e)))?;
        }

        debug!("Configuration validation completed");
        Ok(())
    }

    /// Merge with another configuration (other takes precedence where it
    /// differs from the defaults)
    pub fn merge(mut self, other: Self) -> Self {
        self.circuit_breaker = merge_breaker(self.circuit_breaker, other.circuit_breaker);
        self.retry = merge_retry(self.retry, other.retry);
        if other.recovery != RecoveryConfig::default() {
            self.recovery = other.recovery;
        }
        if other.health != HealthMonitorConfig::default() {
            self.health = other.health;
        }
        if other.degradation != DegradationConfig::default() {
            self.degradation = other.degradation;
        }
        if other.logging != LoggingConfig::default() {
            self.logging = other.logging;
        }
        self
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ResilienceError::config(format!("Failed to serialize config to JSON: {}", e)))
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ResilienceError::config(format!("Failed to serialize config to YAML: {}", e)))
    }
}

fn merge_breaker(mut base: CircuitBreakerConfig, other: CircuitBreakerConfig) -> CircuitBreakerConfig {
    let defaults = CircuitBreakerConfig::default();
    if !other.name.is_empty() {
        base.name = other.name;
    }
    if other.failure_threshold != defaults.failure_threshold {
        base.failure_threshold = other.failure_threshold;
    }
    if other.success_threshold != defaults.success_threshold {
        base.success_threshold = other.success_threshold;
    }
    if other.timeout_ms != defaults.timeout_ms {
        base.timeout_ms = other.timeout_ms;
    }
    if other.recovery_timeout_ms != defaults.recovery_timeout_ms {
        base.recovery_timeout_ms = other.recovery_timeout_ms;
    }
    if other.monitoring_period_ms != defaults.monitoring_period_ms {
        base.monitoring_period_ms = other.monitoring_period_ms;
    }
    if other.volume_threshold != defaults.volume_threshold {
        base.volume_threshold = other.volume_threshold;
    }
    if other.error_threshold != defaults.error_threshold {
        base.error_threshold = other.error_threshold;
    }
    base
}

fn merge_retry(mut base: RetryConfig, other: RetryConfig) -> RetryConfig {
    let defaults = RetryConfig::default();
    if other.max_attempts != defaults.max_attempts {
        base.max_attempts = other.max_attempts;
    }
    if other.initial_delay_ms != defaults.initial_delay_ms {
        base.initial_delay_ms = other.initial_delay_ms;
    }
    if other.max_delay_ms != defaults.max_delay_ms {
        base.max_delay_ms = other.max_delay_ms;
    }
    if other.strategy != defaults.strategy {
        base.strategy = other.strategy;
    }
    if other.multiplier != defaults.multiplier {
        base.multiplier = other.multiplier;
    }
    if other.jitter_max_ms != defaults.jitter_max_ms {
        base.jitter_max_ms = other.jitter_max_ms;
    }
    if !other.retryable_errors.is_empty() {
        base.retryable_errors = other.retryable_errors;
    }
    if other.non_retryable_errors != defaults.non_retryable_errors {
        base.non_retryable_errors = other.non_retryable_errors;
    }
    base
}

struct EnvReader<L> {
    lookup: L,
}

impl<L> EnvReader<L>
where
    L: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<(String, String)> {
        let name = format!("{}{}", ENV_PREFIX, key);
        (self.lookup)(&name).map(|value| (name, value))
    }

    /// Overwrite `target` with the parsed variable when it is set
    fn set<T>(&self, key: &str, target: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some((name, value)) = self.get(key) {
            *target = value
                .trim()
                .parse()
                .map_err(|e| ResilienceError::config(format!("Invalid {}: {}", name, e)))?;
        }
        Ok(())
    }

    /// Like [`Self::set`] for enums spelled as in the YAML file
    fn set_yaml<T: DeserializeOwned>(&self, key: &str, target: &mut T) -> Result<()> {
        if let Some((name, value)) = self.get(key) {
            *target = serde_yaml::from_str(value.trim())
                .map_err(|e| ResilienceError::config(format!("Invalid {}: {}", name, e)))?;
        }
        Ok(())
    }
}
