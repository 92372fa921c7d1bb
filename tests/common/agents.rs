//! Test agents
//!
//! Real `Agent` implementations with scripted behavior, not mocks.

use agent_resilience::agent::{Agent, AgentResult, Task};
use agent_resilience::error::{ResilienceError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Raises `error` for the first `failures` calls, then succeeds
pub struct FlakyAgent {
    id: String,
    failures: u32,
    error: String,
    calls: AtomicU32,
    cleanups: AtomicU32,
}

impl FlakyAgent {
    pub fn new(id: &str, failures: u32, error: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            failures,
            error: error.to_string(),
            calls: AtomicU32::new(0),
            cleanups: AtomicU32::new(0),
        })
    }

    /// Never succeeds
    pub fn broken(id: &str, error: &str) -> Arc<Self> {
        Self::new(id, u32::MAX, error)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> u32 {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for FlakyAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, task: &Task) -> Result<AgentResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ResilienceError::agent(self.error.clone()));
        }
        Ok(AgentResult::success(
            &self.id,
            &task.id,
            json!({ "task": task.name, "call": call + 1 }),
        ))
    }

    async fn cleanup(&self) -> Result<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Succeeds after sleeping for `delay`
pub struct SlowAgent {
    id: String,
    delay: Duration,
}

impl SlowAgent {
    pub fn new(id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            delay,
        })
    }
}

#[async_trait]
impl Agent for SlowAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, task: &Task) -> Result<AgentResult> {
        tokio::time::sleep(self.delay).await;
        Ok(AgentResult::success(&self.id, &task.id, json!("done")))
    }
}
