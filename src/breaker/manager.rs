//! Registry of named circuit breakers

use super::circuit_breaker::CircuitBreaker;
use super::types::{BreakerOverrides, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
use crate::error::Result;
use crate::events::EventBus;
use crate::health::HealthStatus;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Aggregate health of every registered breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerHealthReport {
    pub status: HealthStatus,
    pub total: usize,
    pub open: usize,
    pub half_open: usize,
    pub closed: usize,
    /// Sum of failures over sum of requests across breakers
    pub error_rate: f64,
    pub open_breakers: Vec<String>,
}

/// Name-keyed registry of circuit breakers sharing defaults and an event bus
#[derive(Debug)]
pub struct CircuitBreakerManager {
    defaults: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    monitors: Mutex<HashMap<String, JoinHandle<()>>>,
    events: EventBus,
    auto_monitor: bool,
}

impl CircuitBreakerManager {
    /// Create a manager; breakers roll their metrics windows automatically
    pub fn new(defaults: CircuitBreakerConfig, events: EventBus) -> Self {
        Self {
            defaults,
            breakers: DashMap::new(),
            monitors: Mutex::new(HashMap::new()),
            events,
            auto_monitor: true,
        }
    }

    /// Disable the per-breaker window monitor tasks
    pub fn without_monitoring(mut self) -> Self {
        self.auto_monitor = false;
        self
    }

    pub fn defaults(&self) -> &CircuitBreakerConfig {
        &self.defaults
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Breaker for `name`, created from defaults merged with `overrides` on
    /// first use. Overrides are ignored for an existing breaker.
    pub fn get_or_create(&self, name: &str, overrides: Option<&BreakerOverrides>) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }

        let breaker = match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => return entry.get().clone(),
            Entry::Vacant(entry) => {
                let mut config = match overrides {
                    Some(overrides) => self.defaults.clone().merge(overrides),
                    None => self.defaults.clone(),
                };
                config.name = name.to_string();
                let breaker = Arc::new(CircuitBreaker::new(config, self.events.clone()));
                entry.insert(breaker.clone());
                breaker
            }
        };

        info!("Registered circuit breaker '{}'", name);
        if self.auto_monitor {
            if let Some(handle) = breaker.spawn_monitor() {
                self.monitors.lock().insert(name.to_string(), handle);
            }
        }
        breaker
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| b.clone())
    }

    /// Remove a breaker and stop its monitor
    pub fn remove(&self, name: &str) -> bool {
        if let Some(handle) = self.monitors.lock().remove(name) {
            handle.abort();
        }
        self.breakers.remove(name).is_some()
    }

    /// Run `operation` under the breaker named `name`
    pub async fn execute<F, Fut, T>(&self, name: &str, operation: F, timeout: Option<Duration>) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.get_or_create(name, None);
        breaker.execute(operation, timeout).await
    }

    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn states(&self) -> HashMap<String, CircuitState> {
        self.breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().state()))
            .collect()
    }

    pub fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        let mut stats: Vec<_> = self.breakers.iter().map(|e| e.value().stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Names of breakers currently open
    pub fn open_circuits(&self) -> Vec<String> {
        let mut open: Vec<_> = self
            .breakers
            .iter()
            .filter(|e| e.value().state() == CircuitState::Open)
            .map(|e| e.key().clone())
            .collect();
        open.sort();
        open
    }

    /// Σfailures / Σrequests over the current windows of all breakers
    pub fn overall_error_rate(&self) -> f64 {
        let (failures, requests) = self.breakers.iter().fold((0u64, 0u64), |(f, r), e| {
            let metrics = e.value().metrics();
            (f + metrics.failure_count, r + metrics.request_count)
        });
        if requests == 0 {
            0.0
        } else {
            failures as f64 / requests as f64
        }
    }

    /// Healthy when nothing is open or half-open, degraded while fewer than
    /// half the breakers are open, unhealthy otherwise
    pub fn health(&self) -> BreakerHealthReport {
        let states = self.states();
        let total = states.len();
        let open = states.values().filter(|s| **s == CircuitState::Open).count();
        let half_open = states
            .values()
            .filter(|s| **s == CircuitState::HalfOpen)
            .count();
        let closed = total - open - half_open;

        let status = if open == 0 && half_open == 0 {
            HealthStatus::Healthy
        } else if (open as f64) < total as f64 / 2.0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        BreakerHealthReport {
            status,
            total,
            open,
            half_open,
            closed,
            error_rate: self.overall_error_rate(),
            open_breakers: self.open_circuits(),
        }
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        debug!("Reset {} circuit breakers", self.breakers.len());
    }

    /// Stop all window monitor tasks
    pub fn shutdown(&self) {
        let handles: Vec<_> = self.monitors.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.abort();
        }
        info!("Circuit breaker monitoring shutdown complete");
    }
}

impl Drop for CircuitBreakerManager {
    fn drop(&mut self) {
        for (_, handle) in self.monitors.get_mut().drain() {
            handle.abort();
        }
    }
}
