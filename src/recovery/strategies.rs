//! Recovery strategies
//!
//! A strategy turns a reported agent failure into a (possibly partial)
//! result. The manager runs exactly one strategy per failure: the first
//! applicable one in ascending priority order.

use super::types::ErrorContext;
use crate::agent::{Agent, AgentResult, Task};
use crate::error::{ResilienceError, Result};
use crate::retry::{RetryConfig, delay_for};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

static RESOURCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)resource|memory|connection").expect("Invalid resource regex"));
static TIMEOUT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)timeout|timed out").expect("Invalid timeout regex"));
static DEPENDENCY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)dependency|module|import").expect("Invalid dependency regex"));

/// Deadline assumed for tasks without one when extending it
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// A named, conditionally applicable recovery procedure
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Lower values are tried first
    fn priority(&self) -> u32;

    fn can_handle(&self, context: &ErrorContext) -> bool;

    /// Attempt recovery, possibly re-invoking the agent
    async fn execute(&self, context: &ErrorContext, agent: &dyn Agent, task: &Task)
    -> Result<AgentResult>;
}

/// Waits out a backoff delay and runs the task again
#[derive(Debug, Clone)]
pub struct ExponentialBackoffRetry {
    backoff: RetryConfig,
}

impl ExponentialBackoffRetry {
    pub fn new(backoff: RetryConfig) -> Self {
        Self { backoff }
    }
}

#[async_trait]
impl RecoveryStrategy for ExponentialBackoffRetry {
    fn name(&self) -> &str {
        "exponential_backoff_retry"
    }

    fn priority(&self) -> u32 {
        1
    }

    fn can_handle(&self, context: &ErrorContext) -> bool {
        context.attempt < context.max_attempts
    }

    async fn execute(
        &self,
        context: &ErrorContext,
        agent: &dyn Agent,
        task: &Task,
    ) -> Result<AgentResult> {
        let delay = delay_for(&self.backoff, context.attempt);
        debug!(
            "Retrying task {} on agent {} in {:?} (attempt {}/{})",
            task.id, context.agent_id, delay, context.attempt, context.max_attempts
        );
        tokio::time::sleep(delay).await;
        agent.execute(task).await
    }
}

/// Releases and re-acquires agent resources before running the task again
#[derive(Debug, Clone, Default)]
pub struct ResourceCleanup;

#[async_trait]
impl RecoveryStrategy for ResourceCleanup {
    fn name(&self) -> &str {
        "resource_cleanup"
    }

    fn priority(&self) -> u32 {
        2
    }

    fn can_handle(&self, context: &ErrorContext) -> bool {
        RESOURCE_PATTERN.is_match(&context.error)
    }

    async fn execute(
        &self,
        context: &ErrorContext,
        agent: &dyn Agent,
        task: &Task,
    ) -> Result<AgentResult> {
        info!("Cleaning up resources of agent {}", context.agent_id);
        agent.cleanup().await?;
        agent.initialize().await?;
        agent.execute(task).await
    }
}

/// Runs the task again with twice its deadline
#[derive(Debug, Clone, Default)]
pub struct TimeoutRecovery;

#[async_trait]
impl RecoveryStrategy for TimeoutRecovery {
    fn name(&self) -> &str {
        "timeout_recovery"
    }

    fn priority(&self) -> u32 {
        3
    }

    fn can_handle(&self, context: &ErrorContext) -> bool {
        TIMEOUT_PATTERN.is_match(&context.error)
    }

    async fn execute(
        &self,
        context: &ErrorContext,
        agent: &dyn Agent,
        task: &Task,
    ) -> Result<AgentResult> {
        let extended = task.timeout().unwrap_or(DEFAULT_TASK_TIMEOUT) * 2;
        debug!(
            "Retrying task {} on agent {} with extended timeout {:?}",
            task.id, context.agent_id, extended
        );
        let task = task.clone().with_timeout(extended);
        tokio::time::timeout(extended, agent.execute(&task))
            .await
            .map_err(|_| {
                ResilienceError::timeout(format!(
                    "Task {} timed out after extended deadline {:?}",
                    task.id, extended
                ))
            })?
    }
}

/// Re-initializes the agent and retries with optional dependencies skipped
#[derive(Debug, Clone, Default)]
pub struct DependencyRecovery;

#[async_trait]
impl RecoveryStrategy for DependencyRecovery {
    fn name(&self) -> &str {
        "dependency_recovery"
    }

    fn priority(&self) -> u32 {
        4
    }

    fn can_handle(&self, context: &ErrorContext) -> bool {
        DEPENDENCY_PATTERN.is_match(&context.error)
    }

    async fn execute(
        &self,
        context: &ErrorContext,
        agent: &dyn Agent,
        task: &Task,
    ) -> Result<AgentResult> {
        info!("Re-initializing dependencies of agent {}", context.agent_id);
        agent.initialize().await?;
        let task = task
            .clone()
            .with_metadata("skip_optional_dependencies", Value::Bool(true));
        agent.execute(&task).await
    }
}

/// Catch-all producing a degraded placeholder result
#[derive(Debug, Clone, Default)]
pub struct GracefulDegradation;

#[async_trait]
impl RecoveryStrategy for GracefulDegradation {
    fn name(&self) -> &str {
        "graceful_degradation"
    }

    fn priority(&self) -> u32 {
        u32::MAX
    }

    fn can_handle(&self, _context: &ErrorContext) -> bool {
        true
    }

    async fn execute(
        &self,
        context: &ErrorContext,
        _agent: &dyn Agent,
        task: &Task,
    ) -> Result<AgentResult> {
        info!(
            "Returning degraded result for task {} on agent {}",
            task.id, context.agent_id
        );
        let output = json!({
            "degraded": true,
            "task": task.name,
            "message": "Task completed with reduced functionality",
            "original_error": context.error,
        });
        Ok(AgentResult::success(&context.agent_id, &task.id, output).degraded())
    }
}

/// Built-in strategies in priority order
pub fn default_strategies(backoff: RetryConfig) -> Vec<Arc<dyn RecoveryStrategy>> {
    vec![
        Arc::new(ExponentialBackoffRetry::new(backoff)),
        Arc::new(ResourceCleanup),
        Arc::new(TimeoutRecovery),
        Arc::new(DependencyRecovery),
        Arc::new(GracefulDegradation),
    ]
}
