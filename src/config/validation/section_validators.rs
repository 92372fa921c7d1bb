//! Section validators
//!
//! Validation implementations for every section of `ResilienceConfig`.

use super::trait_def::Validate;
use crate::breaker::CircuitBreakerConfig;
use crate::degradation::{DegradationConfig, Trigger};
use crate::health::HealthMonitorConfig;
use crate::recovery::{RecoveryConfig, ResilientAgentConfig};
use crate::retry::{BackoffStrategy, RetryConfig};
use std::collections::HashSet;
use tracing::debug;

fn positive<T: PartialOrd + Default>(value: T, field: &str) -> Result<(), String> {
    if value > T::default() {
        Ok(())
    } else {
        Err(format!("{} must be greater than 0", field))
    }
}

fn ratio(value: f64, field: &str) -> Result<(), String> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(format!("{} must be in (0, 1], got {}", field, value))
    }
}

impl Validate for CircuitBreakerConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating circuit breaker configuration");

        positive(self.failure_threshold, "failure_threshold")?;
        positive(self.success_threshold, "success_threshold")?;
        positive(self.timeout_ms, "timeout_ms")?;
        positive(self.recovery_timeout_ms, "recovery_timeout_ms")?;
        positive(self.monitoring_period_ms, "monitoring_period_ms")?;
        ratio(self.error_threshold, "error_threshold")?;
        Ok(())
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating retry configuration");

        if self.max_attempts < 1 {
            return Err("max_attempts must be at least 1".to_string());
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(format!(
                "max_delay_ms ({}) must not be less than initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            ));
        }

        let exponential = matches!(
            self.strategy,
            BackoffStrategy::Exponential | BackoffStrategy::ExponentialJitter
        );
        if exponential && self.multiplier < 1.0 {
            return Err(format!(
                "multiplier must be at least 1.0 for exponential backoff, got {}",
                self.multiplier
            ));
        }

        Ok(())
    }
}

impl Validate for ResilientAgentConfig {
    fn validate(&self) -> Result<(), String> {
        positive(self.inline_attempts, "inline_attempts")?;
        positive(self.max_concurrent_tasks, "max_concurrent_tasks")?;
        Ok(())
    }
}

impl Validate for RecoveryConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating recovery configuration");

        positive(self.agent_failure_threshold, "agent_failure_threshold")?;
        positive(self.agent_success_threshold, "agent_success_threshold")?;
        positive(self.agent_recovery_time_ms, "agent_recovery_time_ms")?;
        positive(self.max_attempts, "max_attempts")?;
        positive(self.error_history_size, "error_history_size")?;
        self.backoff
            .validate()
            .map_err(|e| format!("backoff: {}", e))?;
        self.resilient_agent
            .validate()
            .map_err(|e| format!("resilient_agent: {}", e))?;
        Ok(())
    }
}

impl Validate for HealthMonitorConfig {
    fn validate(&self) -> Result<(), String> {
        positive(self.check_interval_ms, "check_interval_ms")?;
        positive(self.check_timeout_ms, "check_timeout_ms")?;
        Ok(())
    }
}

impl Validate for DegradationConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating degradation configuration");

        positive(self.evaluation_interval_ms, "evaluation_interval_ms")?;
        positive(self.metrics_window_size, "metrics_window_size")?;
        positive(self.cache_ttl_ms, "cache_ttl_ms")?;

        let mut ids = HashSet::new();
        for rule in &self.rules {
            if rule.id.is_empty() {
                return Err("Degradation rule id cannot be empty".to_string());
            }
            if !ids.insert(rule.id.as_str()) {
                return Err(format!("Duplicate degradation rule id: {}", rule.id));
            }
            if rule.triggers.is_empty() {
                return Err(format!("Degradation rule '{}' has no triggers", rule.id));
            }
            for trigger in &rule.triggers {
                match trigger {
                    Trigger::ErrorRate { threshold }
                    | Trigger::ResourceUsage { threshold, .. } => {
                        ratio(*threshold, &format!("rule '{}' threshold", rule.id))?
                    }
                    Trigger::CircuitBreakerOpen { min_open } => {
                        positive(*min_open, &format!("rule '{}' min_open", rule.id))?
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
