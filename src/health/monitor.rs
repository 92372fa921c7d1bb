//! Health monitor implementation
//!
//! Every registered agent receives a synthetic health task on each tick.
//! A successful result is healthy, a reported failure is degraded, and a
//! raised error or a missed deadline is unhealthy.

use super::types::{AgentHealth, HealthCheckResult, HealthStatus, SystemHealthReport};
use crate::agent::{Agent, Task};
use crate::config::defaults::*;
use crate::events::{EventBus, ResilienceEvent};
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Health monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMonitorConfig {
    /// Interval between health checks (milliseconds)
    #[serde(default = "default_health_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Deadline for a single health task (milliseconds)
    #[serde(default = "default_health_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_health_check_interval_ms(),
            check_timeout_ms: default_health_check_timeout_ms(),
        }
    }
}

impl HealthMonitorConfig {
    /// Probe interval, never zero
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms).max(MIN_TIMER_PERIOD)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

/// Periodic prober classifying agents healthy, degraded or unhealthy
pub struct SystemHealthMonitor {
    config: HealthMonitorConfig,
    agents: DashMap<String, Arc<dyn Agent>>,
    health: DashMap<String, AgentHealth>,
    events: EventBus,
    check_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SystemHealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemHealthMonitor")
            .field("config", &self.config)
            .field("agents", &self.agents.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SystemHealthMonitor {
    pub fn new(config: HealthMonitorConfig, events: EventBus) -> Self {
        Self {
            config,
            agents: DashMap::new(),
            health: DashMap::new(),
            events,
            check_task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &HealthMonitorConfig {
        &self.config
    }

    /// Register an agent for health monitoring
    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        let agent_id = agent.id().to_string();
        info!("Registering agent for health monitoring: {}", agent_id);
        self.health
            .entry(agent_id.clone())
            .or_insert_with(|| AgentHealth::new(agent_id.clone()));
        self.agents.insert(agent_id, agent);
    }

    pub fn unregister_agent(&self, agent_id: &str) -> bool {
        self.health.remove(agent_id);
        self.agents.remove(agent_id).is_some()
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.agents.iter().map(|e| e.key().clone()).collect()
    }

    /// Probe one registered agent and record the result
    pub async fn check_agent(&self, agent_id: &str) -> Option<HealthCheckResult> {
        let agent = self.agents.get(agent_id).map(|a| a.value().clone())?;
        let result = self.probe(agent.as_ref()).await;
        self.record(agent_id, result.clone());
        Some(result)
    }

    /// Probe every registered agent concurrently
    pub async fn check_all(&self) -> SystemHealthReport {
        let agents: Vec<_> = self
            .agents
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let results = join_all(agents.iter().map(|(_, agent)| self.probe(agent.as_ref()))).await;
        for ((agent_id, _), result) in agents.iter().zip(results) {
            self.record(agent_id, result);
        }

        let report = self.system_health();
        debug!(
            "Health check completed: {} ({} healthy, {} degraded, {} unhealthy)",
            report.status, report.healthy, report.degraded, report.unhealthy
        );
        self.events.emit(ResilienceEvent::HealthCheckCompleted {
            status: report.status,
            agents: agents.len(),
            timestamp: report.timestamp,
        });
        report
    }

    async fn probe(&self, agent: &dyn Agent) -> HealthCheckResult {
        if !agent.is_available() {
            return HealthCheckResult::degraded("Agent at capacity", 0);
        }

        let task = Task::health_check();
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.check_timeout(), agent.execute(&task)).await;
        let elapsed = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(result)) if result.success => HealthCheckResult::healthy(elapsed),
            Ok(Ok(result)) => HealthCheckResult::degraded(
                result
                    .error
                    .unwrap_or_else(|| "Health task reported failure".to_string()),
                elapsed,
            ),
            Ok(Err(error)) => HealthCheckResult::unhealthy(error.to_string(), elapsed),
            Err(_) => HealthCheckResult::unhealthy(
                format!("Health check timed out after {:?}", self.config.check_timeout()),
                elapsed,
            ),
        }
    }

    /// Results for agents unregistered while their probe ran are discarded
    fn record(&self, agent_id: &str, result: HealthCheckResult) {
        let unhealthy = result.status == HealthStatus::Unhealthy;
        let error = result.error.clone().unwrap_or_default();

        match self.health.get_mut(agent_id) {
            Some(mut health) if self.agents.contains_key(agent_id) => health.update(result),
            _ => {
                debug!("Discarding health result for unregistered agent '{}'", agent_id);
                return;
            }
        }

        if unhealthy {
            warn!("Agent '{}' is unhealthy: {}", agent_id, error);
            self.events.emit(ResilienceEvent::AgentUnhealthy {
                agent_id: agent_id.to_string(),
                error,
            });
        }
    }

    pub fn agent_health(&self, agent_id: &str) -> Option<AgentHealth> {
        self.health.get(agent_id).map(|h| h.clone())
    }

    /// Aggregate of the last recorded results
    pub fn system_health(&self) -> SystemHealthReport {
        let agents = self
            .health
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        SystemHealthReport::from_agents(agents)
    }

    pub fn is_running(&self) -> bool {
        self.check_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Start periodic checks; a second call while running is a no-op.
    ///
    /// The task holds only a weak reference and ends once the monitor is
    /// dropped.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.check_task.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(self);
        let interval = self.config.check_interval();
        info!("Starting health monitoring every {:?}", interval);

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(monitor) = weak.upgrade() else {
                    break;
                };
                monitor.check_all().await;
            }
        }));
    }

    /// Stop periodic checks
    pub fn shutdown(&self) {
        if let Some(task) = self.check_task.lock().take() {
            task.abort();
            info!("Health monitoring shutdown complete");
        }
    }
}

impl Drop for SystemHealthMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.check_task.get_mut().take() {
            task.abort();
        }
    }
}
