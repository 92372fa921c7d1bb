//! Agent capability surface consumed from the orchestration layer

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Unit of work handed to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub payload: Value,
    /// Optional deadline for the whole task (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Task {
    /// Task with a fresh id and an empty payload
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            payload: Value::Null,
            timeout_ms: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Synthetic task used by the health monitor
    pub fn health_check() -> Self {
        Self::new("health_check").with_metadata("health_check", Value::Bool(true))
    }

    pub fn is_health_check(&self) -> bool {
        self.metadata
            .get("health_check")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Structured outcome returned at the agent boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub agent_id: String,
    pub task_id: String,
    /// Name of the recovery strategy that produced this result, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_by: Option<String>,
    /// Whether the output is a partial or substitute result
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub duration_ms: u64,
}

impl AgentResult {
    pub fn success(agent_id: impl Into<String>, task_id: impl Into<String>, output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            recovered_by: None,
            degraded: false,
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn failure(
        agent_id: impl Into<String>,
        task_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            recovered_by: None,
            degraded: false,
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn recovered_by(mut self, strategy: impl Into<String>) -> Self {
        self.recovered_by = Some(strategy.into());
        self
    }

    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }
}

/// Autonomous worker invoked by the orchestrator.
///
/// `execute` returns `Ok` with `success == false` for failures the agent
/// reports itself, and `Err` for failures it raises.
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    async fn execute(&self, task: &Task) -> Result<AgentResult>;

    /// Acquire resources; called again by recovery strategies after cleanup
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Whether the agent can take more work right now
    fn is_available(&self) -> bool {
        true
    }
}
