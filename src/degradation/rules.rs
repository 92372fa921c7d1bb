//! Degradation rules: triggers, actions and recovery conditions

use super::types::SystemMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Predicate over a metrics snapshot
#[derive(Clone)]
pub struct MetricsPredicate(Arc<dyn Fn(&SystemMetrics) -> bool + Send + Sync>);

impl MetricsPredicate {
    pub fn new(f: impl Fn(&SystemMetrics) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn test(&self, metrics: &SystemMetrics) -> bool {
        (self.0)(metrics)
    }
}

impl std::fmt::Debug for MetricsPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MetricsPredicate(..)")
    }
}

impl PartialEq for MetricsPredicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Resource measured by [`Trigger::ResourceUsage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Cpu,
    Memory,
    DiskSpace,
}

/// Metric condition that makes a rule fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// At least `min_open` circuit breakers are open
    CircuitBreakerOpen { min_open: usize },
    /// p95 response time above the threshold
    ResponseTime { p95_threshold_ms: f64 },
    /// Error rate above the threshold
    ErrorRate { threshold: f64 },
    /// Usage fraction of a resource above the threshold
    ResourceUsage { resource: Resource, threshold: f64 },
    /// Custom metric above the threshold; absent metrics never match
    CustomMetric { name: String, threshold: f64 },
    /// Arbitrary predicate, code-only
    #[serde(skip)]
    Predicate(MetricsPredicate),
}

impl Trigger {
    pub fn matches(&self, metrics: &SystemMetrics) -> bool {
        match self {
            Trigger::CircuitBreakerOpen { min_open } => metrics.open_circuits() >= *min_open,
            Trigger::ResponseTime { p95_threshold_ms } => {
                metrics.response_time.p95 > *p95_threshold_ms
            }
            Trigger::ErrorRate { threshold } => metrics.error_rate > *threshold,
            Trigger::ResourceUsage {
                resource,
                threshold,
            } => {
                let usage = match resource {
                    Resource::Cpu => metrics.resource_usage.cpu,
                    Resource::Memory => metrics.resource_usage.memory,
                    Resource::DiskSpace => metrics.resource_usage.disk_space,
                };
                usage > *threshold
            }
            Trigger::CustomMetric { name, threshold } => metrics
                .custom
                .get(name)
                .is_some_and(|value| value > threshold),
            Trigger::Predicate(predicate) => predicate.test(metrics),
        }
    }
}

/// Effect applied while a rule is active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    DisableFeature { feature: String },
    /// Serve the last good response of `service` while degraded
    EnableCacheFallback { service: String },
    /// Disable several features at once
    ReduceFunctionality { features: Vec<String> },
    /// Route `service` to a registered fallback
    ActivateFallback { service: String, fallback_id: String },
    Throttle {
        service: String,
        max_requests_per_second: u32,
    },
}

/// A prioritized policy mapping metric conditions to actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationRule {
    pub id: String,
    pub name: String,
    /// 90+ forces emergency mode, 70+ minimal service, 50+ partial degradation
    pub priority: u32,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Extra guard that must hold for the rule to fire
    #[serde(skip)]
    pub condition: Option<MetricsPredicate>,
    #[serde(default = "crate::config::defaults::default_true")]
    pub auto_recover: bool,
    /// When set, must hold before the rule lets the system recover
    #[serde(skip)]
    pub recovery_condition: Option<MetricsPredicate>,
    /// After this long active, the rule no longer blocks recovery (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,
}

impl DegradationRule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
            triggers: Vec::new(),
            actions: Vec::new(),
            condition: None,
            auto_recover: true,
            recovery_condition: None,
            max_duration_ms: None,
        }
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_condition(
        mut self,
        condition: impl Fn(&SystemMetrics) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(MetricsPredicate::new(condition));
        self
    }

    pub fn with_recovery_condition(
        mut self,
        condition: impl Fn(&SystemMetrics) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.recovery_condition = Some(MetricsPredicate::new(condition));
        self
    }

    pub fn auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration_ms = Some(max_duration.as_millis() as u64);
        self
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_ms.map(Duration::from_millis)
    }

    pub fn triggered(&self, metrics: &SystemMetrics) -> bool {
        self.triggers.iter().any(|t| t.matches(metrics))
    }

    /// Condition holds (or is absent) and at least one trigger matches
    pub fn fires(&self, metrics: &SystemMetrics) -> bool {
        self.condition.as_ref().is_none_or(|c| c.test(metrics)) && self.triggered(metrics)
    }

    /// Whether this active rule allows recovery.
    ///
    /// Requires auto-recovery; then either the maximum duration has passed,
    /// or the recovery condition holds (when set), or no trigger matches.
    pub fn can_recover(&self, metrics: &SystemMetrics, active_for: Duration) -> bool {
        if !self.auto_recover {
            return false;
        }
        if self.max_duration().is_some_and(|max| active_for >= max) {
            return true;
        }
        match &self.recovery_condition {
            Some(condition) => condition.test(metrics),
            None => !self.triggered(metrics),
        }
    }

    /// Features this rule disables
    pub fn disabled_features(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().flat_map(|action| -> Vec<&str> {
            match action {
                Action::DisableFeature { feature } => vec![feature.as_str()],
                Action::ReduceFunctionality { features } => {
                    features.iter().map(String::as_str).collect()
                }
                _ => Vec::new(),
            }
        })
    }
}
