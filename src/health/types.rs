//! Health status types and check results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Health status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational
    Healthy,
    /// Operational but reporting failures or at capacity
    Degraded,
    /// Raising errors or not answering in time
    Unhealthy,
}

impl HealthStatus {
    /// Check if the status allows requests
    pub fn allows_requests(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    /// Worst of all statuses; healthy when empty
    pub fn aggregate<'a>(statuses: impl IntoIterator<Item = &'a HealthStatus>) -> HealthStatus {
        let mut result = HealthStatus::Healthy;
        for status in statuses {
            match status {
                HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
                HealthStatus::Degraded => result = HealthStatus::Degraded,
                HealthStatus::Healthy => {}
            }
        }
        result
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(label)
    }
}

/// Outcome of one health probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl HealthCheckResult {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            response_time_ms,
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn degraded(reason: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Degraded,
            response_time_ms,
            timestamp: Utc::now(),
            error: Some(reason.into()),
        }
    }

    pub fn unhealthy(error: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            response_time_ms,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Health tracked for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    pub agent_id: String,
    pub status: HealthStatus,
    pub last_check: Option<HealthCheckResult>,
    /// Checks in a row that were not healthy
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub last_healthy: Option<DateTime<Utc>>,
}

impl AgentHealth {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: HealthStatus::Healthy,
            last_check: None,
            consecutive_failures: 0,
            total_checks: 0,
            last_healthy: None,
        }
    }

    /// Update with new health check result
    pub fn update(&mut self, result: HealthCheckResult) {
        self.status = result.status;
        self.total_checks += 1;
        if result.status == HealthStatus::Healthy {
            self.consecutive_failures = 0;
            self.last_healthy = Some(result.timestamp);
        } else {
            self.consecutive_failures += 1;
        }
        self.last_check = Some(result);
    }
}

/// Aggregate health of every registered agent
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealthReport {
    pub status: HealthStatus,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub agents: HashMap<String, AgentHealth>,
    pub timestamp: DateTime<Utc>,
}

impl SystemHealthReport {
    pub fn from_agents(agents: HashMap<String, AgentHealth>) -> Self {
        let count = |status: HealthStatus| agents.values().filter(|a| a.status == status).count();
        Self {
            status: HealthStatus::aggregate(agents.values().map(|a| &a.status)),
            healthy: count(HealthStatus::Healthy),
            degraded: count(HealthStatus::Degraded),
            unhealthy: count(HealthStatus::Unhealthy),
            agents,
            timestamp: Utc::now(),
        }
    }
}
