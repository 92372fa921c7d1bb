//! Types and configurations for agent error recovery

use crate::config::defaults::*;
use crate::error::ResilienceError;
use crate::retry::{BackoffStrategy, RetryConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Error recovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Failures that open an agent's breaker
    #[serde(default = "default_agent_failure_threshold")]
    pub agent_failure_threshold: u32,
    /// Successes while half-open that close an agent's breaker
    #[serde(default = "default_agent_success_threshold")]
    pub agent_success_threshold: u32,
    /// Time an agent's breaker stays open (milliseconds)
    #[serde(default = "default_agent_recovery_time_ms")]
    pub agent_recovery_time_ms: u64,
    /// Attempts after which backoff retry no longer applies
    #[serde(default = "default_recovery_max_attempts")]
    pub max_attempts: u32,
    /// Capacity of the error history ring buffer
    #[serde(default = "default_error_history_size")]
    pub error_history_size: usize,
    /// Delays used by the backoff retry strategy
    #[serde(default)]
    pub backoff: RetryConfig,
    #[serde(default)]
    pub resilient_agent: ResilientAgentConfig,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            agent_failure_threshold: default_agent_failure_threshold(),
            agent_success_threshold: default_agent_success_threshold(),
            agent_recovery_time_ms: default_agent_recovery_time_ms(),
            max_attempts: default_recovery_max_attempts(),
            error_history_size: default_error_history_size(),
            backoff: RetryConfig::default(),
            resilient_agent: ResilientAgentConfig::default(),
        }
    }
}

impl RecoveryConfig {
    pub fn agent_recovery_time(&self) -> Duration {
        Duration::from_millis(self.agent_recovery_time_ms)
    }
}

/// Inline retry and concurrency limits of a wrapped agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilientAgentConfig {
    /// Attempts made inline before handing over to recovery
    #[serde(default = "default_inline_attempts")]
    pub inline_attempts: u32,
    /// Base delay between inline attempts, doubled each time (milliseconds)
    #[serde(default = "default_inline_retry_delay_ms")]
    pub inline_retry_delay_ms: u64,
    /// In-flight tasks at which the agent reports itself unavailable
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

impl Default for ResilientAgentConfig {
    fn default() -> Self {
        Self {
            inline_attempts: default_inline_attempts(),
            inline_retry_delay_ms: default_inline_retry_delay_ms(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

impl ResilientAgentConfig {
    /// Doubling backoff between inline attempts
    pub fn inline_backoff(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.inline_attempts.max(1),
            initial_delay_ms: self.inline_retry_delay_ms,
            max_delay_ms: default_max_delay_ms().max(self.inline_retry_delay_ms),
            strategy: BackoffStrategy::Exponential,
            multiplier: 2.0,
            ..RetryConfig::default()
        }
    }
}

/// Immutable record of one reported agent failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub agent_id: String,
    pub task_id: String,
    /// Rendered error message
    pub error: String,
    /// Error class name
    pub error_kind: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ErrorContext {
    pub fn new(
        agent_id: impl Into<String>,
        task_id: impl Into<String>,
        error: &ResilienceError,
        attempt: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            error: error.to_string(),
            error_kind: error.name().to_string(),
            attempt,
            max_attempts,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Error statistics of an [`super::ErrorRecoveryManager`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorStats {
    pub total_errors: u64,
    pub errors_by_agent: HashMap<String, u64>,
    pub errors_by_kind: HashMap<String, u64>,
    pub recoveries_attempted: u64,
    pub recoveries_succeeded: u64,
    /// Failures rejected because the agent's breaker was open
    pub rejected: u64,
    /// Runs per strategy name
    pub strategy_usage: HashMap<String, u64>,
    /// Most recent errors, newest last
    pub recent_errors: Vec<ErrorContext>,
}
