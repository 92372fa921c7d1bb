//! System-wide graceful degradation policy engine

use super::fallback::{FallbackReason, FallbackRequest, FallbackStrategy};
use super::metrics::{MetricsCollector, RequestMetrics};
use super::rules::{Action, DegradationRule};
use super::types::{DegradationConfig, DegradationLevel, DegradationState, LevelChange, SystemMetrics};
use crate::error::{ResilienceError, Result};
use crate::events::{EventBus, ResilienceEvent};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Fallback id reported when the response cache answers
const CACHE_FALLBACK_ID: &str = "cache";

#[derive(Debug, Default)]
struct Inner {
    level: DegradationLevel,
    /// Active rule ids with the instant each became active
    active_rules: Vec<(String, Instant)>,
    /// Features disabled by the current level and active rules
    policy_disabled: BTreeSet<String>,
    /// Features disabled by an operator
    manual_disabled: BTreeSet<String>,
    /// Fallbacks routed by active rules
    rule_fallbacks: HashMap<String, String>,
    /// Fallbacks recorded while serving requests
    used_fallbacks: HashMap<String, String>,
    cache_fallbacks: BTreeSet<String>,
    throttles: HashMap<String, u32>,
    start_time: Option<DateTime<Utc>>,
    last_metrics: Option<SystemMetrics>,
    reason: Option<String>,
    history: VecDeque<LevelChange>,
}

impl Inner {
    fn is_disabled(&self, feature: &str) -> bool {
        self.policy_disabled.contains(feature) || self.manual_disabled.contains(feature)
    }

    fn active_ids(&self) -> HashSet<&str> {
        self.active_rules.iter().map(|(id, _)| id.as_str()).collect()
    }
}

/// Moves the system through ordered degradation levels based on rules
/// evaluated against live metrics.
pub struct GracefulDegradationManager {
    config: DegradationConfig,
    /// Sorted by descending priority
    rules: RwLock<Vec<DegradationRule>>,
    fallbacks: RwLock<Vec<FallbackStrategy>>,
    inner: Mutex<Inner>,
    collector: Arc<dyn MetricsCollector>,
    requests: Arc<RequestMetrics>,
    cache: Cache<String, Value>,
    events: EventBus,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for GracefulDegradationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GracefulDegradationManager")
            .field("level", &self.current_level())
            .field("rules", &self.rule_ids())
            .field("fallbacks", &self.fallbacks.read().len())
            .finish()
    }
}

impl GracefulDegradationManager {
    /// Create a manager; rules from `config` are registered immediately
    pub fn new(
        config: DegradationConfig,
        collector: Arc<dyn MetricsCollector>,
        events: EventBus,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(config.cache_ttl())
            .build();
        let requests = Arc::new(RequestMetrics::new(config.metrics_window_size));
        let mut rules = config.rules.clone();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        Self {
            rules: RwLock::new(rules),
            fallbacks: RwLock::new(Vec::new()),
            inner: Mutex::new(Inner::default()),
            collector,
            requests,
            cache,
            events,
            monitor: Mutex::new(None),
            config,
        }
    }

    /// Record outcomes of `execute_with_fallback` into `requests`, typically
    /// the window the collector reads from
    pub fn with_request_metrics(mut self, requests: Arc<RequestMetrics>) -> Self {
        self.requests = requests;
        self
    }

    pub fn config(&self) -> &DegradationConfig {
        &self.config
    }

    pub fn request_metrics(&self) -> &Arc<RequestMetrics> {
        &self.requests
    }

    // ==================== Registration ====================

    /// Register a rule, replacing any rule with the same id
    pub fn add_rule(&self, rule: DegradationRule) {
        info!(
            "Registered degradation rule '{}' with priority {}",
            rule.id, rule.priority
        );
        let mut rules = self.rules.write();
        rules.retain(|r| r.id != rule.id);
        rules.push(rule);
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn remove_rule(&self, id: &str) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.id != id);
        rules.len() != before
    }

    /// Rule ids by descending priority
    pub fn rule_ids(&self) -> Vec<String> {
        self.rules.read().iter().map(|r| r.id.clone()).collect()
    }

    /// Register a fallback, replacing any fallback with the same id
    pub fn register_fallback(&self, fallback: FallbackStrategy) {
        info!(
            "Registered fallback '{}' for service '{}'",
            fallback.id, fallback.service
        );
        let mut fallbacks = self.fallbacks.write();
        fallbacks.retain(|f| f.id != fallback.id);
        fallbacks.push(fallback);
    }

    pub fn remove_fallback(&self, id: &str) -> bool {
        let mut fallbacks = self.fallbacks.write();
        let before = fallbacks.len();
        fallbacks.retain(|f| f.id != id);
        fallbacks.len() != before
    }

    // ==================== Evaluation ====================

    /// Collect metrics and evaluate every rule once
    pub async fn evaluate(&self) -> DegradationLevel {
        let metrics = self.collector.collect().await;
        self.evaluate_metrics(metrics)
    }

    /// Evaluate every rule against `metrics`.
    ///
    /// A changed set of firing rules re-applies degradation. When nothing
    /// fires, the system recovers only if every active rule allows it.
    pub fn evaluate_metrics(&self, metrics: SystemMetrics) -> DegradationLevel {
        let firing: Vec<DegradationRule> = self
            .rules
            .read()
            .iter()
            .filter(|rule| rule.fires(&metrics))
            .cloned()
            .collect();

        let mut events = Vec::new();
        let level = {
            let mut inner = self.inner.lock();
            inner.last_metrics = Some(metrics.clone());

            if !firing.is_empty() {
                let changed = {
                    let active = inner.active_ids();
                    firing.len() != active.len()
                        || firing.iter().any(|r| !active.contains(r.id.as_str()))
                };
                if changed {
                    self.apply(&mut inner, &firing, &mut events);
                }
            } else if inner.level != DegradationLevel::FullService || !inner.active_rules.is_empty()
            {
                if self.recoverable(&inner, &metrics) {
                    self.recover(&mut inner, "All degradation rules recovered", &mut events);
                } else {
                    debug!(
                        "Recovery blocked at {}: active rules still holding",
                        inner.level
                    );
                }
            }
            inner.level
        };

        for event in events {
            self.events.emit(event);
        }
        level
    }

    fn recoverable(&self, inner: &Inner, metrics: &SystemMetrics) -> bool {
        let rules = self.rules.read();
        let now = Instant::now();
        inner.active_rules.iter().all(|(id, since)| {
            match rules.iter().find(|r| &r.id == id) {
                Some(rule) => rule.can_recover(metrics, now.duration_since(*since)),
                // Removed rules no longer hold the system
                None => true,
            }
        })
    }

    fn apply(&self, inner: &mut Inner, firing: &[DegradationRule], events: &mut Vec<ResilienceEvent>) {
        let previous = inner.level;
        let max_priority = firing.iter().map(|r| r.priority).max().unwrap_or(0);
        let level = DegradationLevel::for_priority(max_priority).unwrap_or(previous);
        let names: Vec<&str> = firing.iter().map(|r| r.name.as_str()).collect();
        let reason = format!("Rules triggered: {}", names.join(", "));

        // Keep activation times of rules that stay active
        let now = Instant::now();
        let active_rules = firing
            .iter()
            .map(|rule| {
                let since = inner
                    .active_rules
                    .iter()
                    .find(|(id, _)| *id == rule.id)
                    .map(|(_, since)| *since)
                    .unwrap_or(now);
                (rule.id.clone(), since)
            })
            .collect();
        inner.active_rules = active_rules;

        let mut disabled: BTreeSet<String> = level
            .disabled_features()
            .into_iter()
            .map(str::to_string)
            .collect();
        inner.rule_fallbacks.clear();
        inner.cache_fallbacks.clear();
        inner.throttles.clear();

        for rule in firing {
            for action in &rule.actions {
                match action {
                    Action::DisableFeature { feature } => {
                        disabled.insert(feature.clone());
                    }
                    Action::ReduceFunctionality { features } => {
                        disabled.extend(features.iter().cloned());
                    }
                    Action::EnableCacheFallback { service } => {
                        inner.cache_fallbacks.insert(service.clone());
                    }
                    Action::ActivateFallback {
                        service,
                        fallback_id,
                    } => {
                        inner
                            .rule_fallbacks
                            .insert(service.clone(), fallback_id.clone());
                    }
                    Action::Throttle {
                        service,
                        max_requests_per_second,
                    } => {
                        inner
                            .throttles
                            .insert(service.clone(), *max_requests_per_second);
                    }
                }
            }
        }

        self.replace_policy_features(inner, disabled, events);

        if level != previous {
            if previous == DegradationLevel::FullService {
                inner.start_time = Some(Utc::now());
            }
            warn!("System degradation level {} -> {}: {}", previous, level, reason);
            events.push(ResilienceEvent::SystemDegraded {
                from: previous,
                to: level,
                reason: reason.clone(),
            });
            self.push_history(inner, previous, level, &reason, firing.iter().map(|r| r.id.clone()).collect());
        } else {
            info!("Degradation re-applied at {}: {}", level, reason);
        }

        inner.level = level;
        inner.reason = Some(reason);
    }

    /// Swap the policy-disabled feature set, publishing the differences
    fn replace_policy_features(
        &self,
        inner: &mut Inner,
        disabled: BTreeSet<String>,
        events: &mut Vec<ResilienceEvent>,
    ) {
        for feature in disabled.difference(&inner.policy_disabled) {
            if !inner.manual_disabled.contains(feature) {
                debug!("Feature '{}' disabled", feature);
                events.push(ResilienceEvent::FeatureDisabled {
                    feature: feature.clone(),
                });
            }
        }
        for feature in inner.policy_disabled.difference(&disabled) {
            if !inner.manual_disabled.contains(feature) {
                debug!("Feature '{}' enabled", feature);
                events.push(ResilienceEvent::FeatureEnabled {
                    feature: feature.clone(),
                });
            }
        }
        inner.policy_disabled = disabled;
    }

    fn recover(&self, inner: &mut Inner, reason: &str, events: &mut Vec<ResilienceEvent>) {
        let previous = inner.level;
        let rules = inner.active_rules.iter().map(|(id, _)| id.clone()).collect();

        self.replace_policy_features(inner, BTreeSet::new(), events);
        inner.active_rules.clear();
        inner.rule_fallbacks.clear();
        inner.used_fallbacks.clear();
        inner.cache_fallbacks.clear();
        inner.throttles.clear();
        inner.start_time = None;
        inner.reason = None;
        inner.level = DegradationLevel::FullService;

        if previous != DegradationLevel::FullService {
            info!("System recovered from {} to FULL_SERVICE", previous);
            events.push(ResilienceEvent::SystemRecovered { from: previous });
            self.push_history(inner, previous, DegradationLevel::FullService, reason, rules);
        }
    }

    fn push_history(
        &self,
        inner: &mut Inner,
        from: DegradationLevel,
        to: DegradationLevel,
        reason: &str,
        rules: Vec<String>,
    ) {
        if self.config.history_size == 0 {
            return;
        }
        if inner.history.len() >= self.config.history_size {
            inner.history.pop_front();
        }
        inner.history.push_back(LevelChange {
            timestamp: Utc::now(),
            from,
            to,
            reason: reason.to_string(),
            rules,
        });
    }

    // ==================== Operator overrides ====================

    /// Move to `level` regardless of rules. Active rules are dropped; the
    /// next evaluation takes over again.
    pub fn force_level(&self, level: DegradationLevel, reason: &str) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if level == DegradationLevel::FullService {
                self.recover(&mut inner, reason, &mut events);
            } else {
                let previous = inner.level;
                let disabled = level
                    .disabled_features()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                inner.active_rules.clear();
                inner.rule_fallbacks.clear();
                inner.cache_fallbacks.clear();
                inner.throttles.clear();
                self.replace_policy_features(&mut inner, disabled, &mut events);
                if level != previous {
                    if previous == DegradationLevel::FullService {
                        inner.start_time = Some(Utc::now());
                    }
                    warn!("System degradation level forced {} -> {}: {}", previous, level, reason);
                    events.push(ResilienceEvent::SystemDegraded {
                        from: previous,
                        to: level,
                        reason: reason.to_string(),
                    });
                    self.push_history(&mut inner, previous, level, reason, Vec::new());
                }
                inner.level = level;
                inner.reason = Some(reason.to_string());
            }
        }
        for event in events {
            self.events.emit(event);
        }
    }

    /// Return to full service immediately
    pub fn force_recovery(&self) {
        self.force_level(DegradationLevel::FullService, "Forced recovery");
    }

    /// Disable a feature until [`Self::enable_feature`] is called
    pub fn disable_feature(&self, feature: &str) {
        let newly = {
            let mut inner = self.inner.lock();
            let was_disabled = inner.is_disabled(feature);
            inner.manual_disabled.insert(feature.to_string());
            !was_disabled
        };
        if newly {
            info!("Feature '{}' disabled manually", feature);
            self.events.emit(ResilienceEvent::FeatureDisabled {
                feature: feature.to_string(),
            });
        }
    }

    /// Re-enable a feature, overriding policy until the next re-application
    pub fn enable_feature(&self, feature: &str) {
        let was_disabled = {
            let mut inner = self.inner.lock();
            let was_disabled = inner.is_disabled(feature);
            inner.manual_disabled.remove(feature);
            inner.policy_disabled.remove(feature);
            was_disabled
        };
        if was_disabled {
            info!("Feature '{}' enabled manually", feature);
            self.events.emit(ResilienceEvent::FeatureEnabled {
                feature: feature.to_string(),
            });
        }
    }

    // ==================== Queries ====================

    pub fn is_feature_enabled(&self, feature: &str) -> bool {
        !self.inner.lock().is_disabled(feature)
    }

    pub fn current_level(&self) -> DegradationLevel {
        self.inner.lock().level
    }

    /// Requests per second allowed for `service` by an active throttle
    pub fn throttle_limit(&self, service: &str) -> Option<u32> {
        self.inner.lock().throttles.get(service).copied()
    }

    pub fn state(&self) -> DegradationState {
        let inner = self.inner.lock();
        let mut active_fallbacks = inner.rule_fallbacks.clone();
        for (service, id) in &inner.used_fallbacks {
            active_fallbacks.insert(service.clone(), id.clone());
        }
        DegradationState {
            level: inner.level,
            active_rules: inner.active_rules.iter().map(|(id, _)| id.clone()).collect(),
            active_fallbacks,
            disabled_features: inner
                .policy_disabled
                .union(&inner.manual_disabled)
                .cloned()
                .collect(),
            cache_fallbacks: inner.cache_fallbacks.clone(),
            throttles: inner.throttles.clone(),
            start_time: inner.start_time,
            last_metrics: inner.last_metrics.clone(),
            reason: inner.reason.clone(),
        }
    }

    /// Level changes, oldest first
    pub fn history(&self) -> Vec<LevelChange> {
        self.inner.lock().history.iter().cloned().collect()
    }

    // ==================== Fallback execution ====================

    /// Run `operation` for `service`, substituting a fallback when the
    /// service is disabled, the system is in emergency mode, or the
    /// operation fails.
    ///
    /// The fallback is `fallback_id` when given, else the cached response
    /// when a cache fallback is active, else the fallback routed by an
    /// active rule, else the highest-priority fallback registered for the
    /// service. A failed operation with no fallback returns its own error.
    pub async fn execute_with_fallback<T, F, Fut>(
        &self,
        service: &str,
        operation: F,
        fallback_id: Option<&str>,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let unavailable = {
            let inner = self.inner.lock();
            if inner.level == DegradationLevel::EmergencyMode {
                Some(FallbackReason::EmergencyMode)
            } else if inner.is_disabled(service) {
                Some(FallbackReason::ServiceDisabled)
            } else {
                None
            }
        };

        let (reason, error) = match unavailable {
            Some(reason) => {
                debug!("Service '{}' unavailable ({:?}), using fallback", service, reason);
                (reason, None)
            }
            None => {
                let started = Instant::now();
                match operation().await {
                    Ok(value) => {
                        self.requests.record(started.elapsed(), true);
                        if let Ok(json) = serde_json::to_value(&value) {
                            self.cache.insert(service.to_string(), json).await;
                        }
                        return Ok(value);
                    }
                    Err(error) => {
                        self.requests.record(started.elapsed(), false);
                        warn!("Service '{}' failed, trying fallback: {}", service, error);
                        (
                            FallbackReason::OperationFailed {
                                error: error.to_string(),
                            },
                            Some(error),
                        )
                    }
                }
            }
        };

        let request = FallbackRequest {
            service: service.to_string(),
            reason,
        };
        match self.run_fallback(&request, fallback_id).await {
            Some(result) => {
                let (id, value) = result?;
                let value = serde_json::from_value(value)?;
                self.inner
                    .lock()
                    .used_fallbacks
                    .insert(service.to_string(), id.clone());
                self.events.emit(ResilienceEvent::FallbackActivated {
                    service: service.to_string(),
                    fallback: id,
                });
                Ok(value)
            }
            None => Err(error.unwrap_or_else(|| ResilienceError::no_fallback(service))),
        }
    }

    /// Resolve and run the fallback for a request; `None` when none exists
    async fn run_fallback(
        &self,
        request: &FallbackRequest,
        fallback_id: Option<&str>,
    ) -> Option<Result<(String, Value)>> {
        let service = request.service.as_str();

        if let Some(id) = fallback_id {
            if let Some(fallback) = self.find_fallback(|f| f.id == id) {
                return Some(fallback.execute(request).await.map(|v| (fallback.id, v)));
            }
            warn!("Requested fallback '{}' for '{}' is not registered", id, service);
        }

        let (use_cache, routed) = {
            let inner = self.inner.lock();
            (
                inner.cache_fallbacks.contains(service),
                inner.rule_fallbacks.get(service).cloned(),
            )
        };

        if use_cache {
            if let Some(cached) = self.cache.get(service).await {
                return Some(Ok((CACHE_FALLBACK_ID.to_string(), cached)));
            }
        }

        if let Some(id) = routed {
            if let Some(fallback) = self.find_fallback(|f| f.id == id) {
                return Some(fallback.execute(request).await.map(|v| (fallback.id, v)));
            }
        }

        let best = {
            let fallbacks = self.fallbacks.read();
            fallbacks
                .iter()
                .filter(|f| f.service == service)
                .max_by_key(|f| f.priority)
                .cloned()
        };
        match best {
            Some(fallback) => Some(fallback.execute(request).await.map(|v| (fallback.id, v))),
            None => None,
        }
    }

    fn find_fallback(&self, predicate: impl Fn(&FallbackStrategy) -> bool) -> Option<FallbackStrategy> {
        self.fallbacks.read().iter().find(|f| predicate(f)).cloned()
    }

    // ==================== Monitoring ====================

    /// Evaluate rules every configured interval; a second call while
    /// running is a no-op. Ends once the manager is dropped.
    pub fn start_monitoring(self: &Arc<Self>) {
        let mut slot = self.monitor.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(self);
        let interval = self.config.evaluation_interval();
        info!("Starting degradation monitoring every {:?}", interval);

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                let level = manager.evaluate().await;
                debug!("Degradation evaluation completed at {}", level);
            }
        }));
    }

    pub fn stop_monitoring(&self) {
        if let Some(task) = self.monitor.lock().take() {
            task.abort();
            info!("Degradation monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for GracefulDegradationManager {
    fn drop(&mut self) {
        if let Some(task) = self.monitor.get_mut().take() {
            task.abort();
        }
    }
}
