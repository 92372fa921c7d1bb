//! Degradation levels, metrics snapshots and manager state

use super::rules::DegradationRule;
use crate::breaker::CircuitState;
use crate::config::defaults::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Ordered severity scale; higher means less functionality
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradationLevel {
    #[default]
    FullService,
    PartialDegradation,
    MinimalService,
    EmergencyMode,
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::FullService => "FULL_SERVICE",
            Self::PartialDegradation => "PARTIAL_DEGRADATION",
            Self::MinimalService => "MINIMAL_SERVICE",
            Self::EmergencyMode => "EMERGENCY_MODE",
        };
        f.write_str(label)
    }
}

const PARTIAL_FEATURES: &[&str] = &["advanced_analytics", "background_processing"];
const MINIMAL_FEATURES: &[&str] = &["real_time_updates", "notifications"];
const EMERGENCY_FEATURES: &[&str] = &["file_uploads", "user_registration", "search", "reporting"];

impl DegradationLevel {
    /// Level implied by the highest firing rule priority, if any
    pub fn for_priority(priority: u32) -> Option<Self> {
        match priority {
            p if p >= 90 => Some(Self::EmergencyMode),
            p if p >= 70 => Some(Self::MinimalService),
            p if p >= 50 => Some(Self::PartialDegradation),
            _ => None,
        }
    }

    /// Features always disabled at this level; each level includes the
    /// features of the levels below it
    pub fn disabled_features(&self) -> Vec<&'static str> {
        let tiers: &[&[&str]] = match self {
            Self::FullService => &[],
            Self::PartialDegradation => &[PARTIAL_FEATURES],
            Self::MinimalService => &[PARTIAL_FEATURES, MINIMAL_FEATURES],
            Self::EmergencyMode => &[PARTIAL_FEATURES, MINIMAL_FEATURES, EMERGENCY_FEATURES],
        };
        tiers.iter().flat_map(|t| t.iter().copied()).collect()
    }
}

/// Response time percentiles (milliseconds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimes {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Resource usage as fractions of capacity (0.0 to 1.0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu: f64,
    pub memory: f64,
    pub disk_space: f64,
}

/// Snapshot of everything degradation rules can look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub timestamp: DateTime<Utc>,
    pub response_time: ResponseTimes,
    /// Failed fraction of recent requests
    pub error_rate: f64,
    /// Requests per second
    pub throughput: f64,
    pub circuit_breakers: HashMap<String, CircuitState>,
    pub resource_usage: ResourceUsage,
    pub active_connections: u64,
    pub queue_size: u64,
    pub custom: HashMap<String, f64>,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            response_time: ResponseTimes::default(),
            error_rate: 0.0,
            throughput: 0.0,
            circuit_breakers: HashMap::new(),
            resource_usage: ResourceUsage::default(),
            active_connections: 0,
            queue_size: 0,
            custom: HashMap::new(),
        }
    }
}

impl SystemMetrics {
    pub fn open_circuits(&self) -> usize {
        self.circuit_breakers
            .values()
            .filter(|s| **s == CircuitState::Open)
            .count()
    }
}

/// Current degradation decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationState {
    pub level: DegradationLevel,
    /// Ids of the rules behind the current level
    pub active_rules: Vec<String>,
    /// Fallback id in use per service
    pub active_fallbacks: HashMap<String, String>,
    /// Every disabled feature, policy-driven and manual
    pub disabled_features: BTreeSet<String>,
    /// Services answering from the response cache
    pub cache_fallbacks: BTreeSet<String>,
    /// Requests per second allowed per service
    pub throttles: HashMap<String, u32>,
    /// When the system left full service
    pub start_time: Option<DateTime<Utc>>,
    pub last_metrics: Option<SystemMetrics>,
    pub reason: Option<String>,
}

/// One recorded level change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelChange {
    pub timestamp: DateTime<Utc>,
    pub from: DegradationLevel,
    pub to: DegradationLevel,
    pub reason: String,
    pub rules: Vec<String>,
}

/// Graceful degradation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationConfig {
    /// Interval between rule evaluations (milliseconds)
    #[serde(default = "default_evaluation_interval_ms")]
    pub evaluation_interval_ms: u64,
    /// Level changes kept in history
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Request samples kept for percentile computation
    #[serde(default = "default_metrics_window_size")]
    pub metrics_window_size: usize,
    /// Services remembered by the response cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Age after which a cached response is no longer served (milliseconds)
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Declarative rules registered at startup
    #[serde(default)]
    pub rules: Vec<DegradationRule>,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_ms: default_evaluation_interval_ms(),
            history_size: default_history_size(),
            metrics_window_size: default_metrics_window_size(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_ms: default_cache_ttl_ms(),
            rules: Vec::new(),
        }
    }
}

impl DegradationConfig {
    /// Rule evaluation interval, never zero
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms).max(MIN_TIMER_PERIOD)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}
