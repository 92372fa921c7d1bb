//! Agent wrapper with inline retry and recovery hand-off

use super::manager::ErrorRecoveryManager;
use super::types::ResilientAgentConfig;
use crate::agent::{Agent, AgentResult, Task};
use crate::error::{ResilienceError, Result};
use crate::retry::delay_for;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Decrements the in-flight counter when a task settles or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps an agent with bounded inline retry.
///
/// Failures that survive the inline attempts go to the
/// [`ErrorRecoveryManager`]; callers always receive a structured
/// [`AgentResult`].
pub struct ResilientAgent {
    inner: Arc<dyn Agent>,
    recovery: Arc<ErrorRecoveryManager>,
    config: ResilientAgentConfig,
    in_flight: AtomicUsize,
}

impl std::fmt::Debug for ResilientAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientAgent")
            .field("id", &self.inner.id())
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl ResilientAgent {
    pub fn new(
        inner: Arc<dyn Agent>,
        recovery: Arc<ErrorRecoveryManager>,
        config: ResilientAgentConfig,
    ) -> Self {
        Self {
            inner,
            recovery,
            config,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Wrap with the limits configured on `recovery`
    pub fn with_defaults(inner: Arc<dyn Agent>, recovery: Arc<ErrorRecoveryManager>) -> Self {
        let config = recovery.config().resilient_agent.clone();
        Self::new(inner, recovery, config)
    }

    pub fn inner(&self) -> &Arc<dyn Agent> {
        &self.inner
    }

    /// Tasks currently executing through this wrapper
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    async fn attempt(&self, task: &Task) -> Result<AgentResult> {
        let outcome = match task.timeout() {
            Some(deadline) => tokio::time::timeout(deadline, self.inner.execute(task))
                .await
                .map_err(|_| {
                    ResilienceError::timeout(format!("Task {} timed out after {:?}", task.id, deadline))
                })?,
            None => self.inner.execute(task).await,
        };

        match outcome {
            Ok(result) if !result.success => Err(ResilienceError::agent(
                result
                    .error
                    .unwrap_or_else(|| format!("Task {} reported failure", task.id)),
            )),
            other => other,
        }
    }
}

#[async_trait]
impl Agent for ResilientAgent {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn execute(&self, task: &Task) -> Result<AgentResult> {
        let _guard = InFlight::enter(&self.in_flight);
        let started = Instant::now();
        let backoff = self.config.inline_backoff();
        let attempts = backoff.max_attempts;
        let mut attempt = 0;

        let last_error = loop {
            attempt += 1;
            match self.attempt(task).await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(
                            "Agent {} succeeded on inline attempt {} for task {}",
                            self.id(),
                            attempt,
                            task.id
                        );
                    }
                    return Ok(result
                        .with_attempts(attempt)
                        .with_duration(started.elapsed()));
                }
                Err(error) if attempt < attempts => {
                    let delay = delay_for(&backoff, attempt);
                    debug!(
                        "Agent {} attempt {} failed for task {}: {}, retrying in {:?}",
                        self.id(),
                        attempt,
                        task.id,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => break error,
            }
        };

        warn!(
            "Agent {} failed task {} after {} attempts, handing over to recovery: {}",
            self.id(),
            task.id,
            attempt,
            last_error
        );
        let result = self
            .recovery
            .handle_error(self.inner.as_ref(), task, &last_error, attempt)
            .await;
        Ok(result.with_duration(started.elapsed()))
    }

    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    async fn cleanup(&self) -> Result<()> {
        self.inner.cleanup().await
    }

    /// Available while under the concurrency limit and the inner agent is
    fn is_available(&self) -> bool {
        self.in_flight() < self.config.max_concurrent_tasks && self.inner.is_available()
    }
}
