//! Circuit breaker implementation for fault tolerance

use super::core::{Admission, BreakerCore, ThresholdPolicy, Transition, WindowCounts};
use super::types::{CircuitBreakerConfig, CircuitBreakerStats, CircuitMetrics, CircuitState};
use crate::error::{CircuitBreakerError, ResilienceError, Result};
use crate::events::{EventBus, ResilienceEvent};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker guarding one named operation
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    core: BreakerCore<ThresholdPolicy>,
    metrics: Mutex<CircuitMetrics>,
    previous_window: Mutex<Option<CircuitMetrics>>,
    created_at: Instant,
    events: EventBus,
}

impl CircuitBreaker {
    /// Create a new circuit breaker publishing to `events`
    pub fn new(config: CircuitBreakerConfig, events: EventBus) -> Self {
        let policy = ThresholdPolicy::from(&config);
        Self {
            config,
            core: BreakerCore::new(policy),
            metrics: Mutex::new(CircuitMetrics::default()),
            previous_window: Mutex::new(None),
            created_at: Instant::now(),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// While open the operation is never invoked. Otherwise it races
    /// `timeout` (or the configured default); a losing operation is dropped,
    /// which cancels it at its next suspension point.
    pub async fn execute<F, Fut, T>(&self, operation: F, timeout: Option<Duration>) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (admission, transition) = self.core.admit();
        self.publish_transition(transition);

        if let Admission::Rejected { retry_after } = admission {
            self.metrics.lock().rejected_count += 1;
            debug!(
                "Circuit breaker '{}' rejected request, retry after {:?}",
                self.config.name, retry_after
            );
            self.events.emit(ResilienceEvent::RequestRejected {
                breaker: self.config.name.clone(),
            });
            return Err(CircuitBreakerError::Open {
                name: self.config.name.clone(),
                retry_after,
            }
            .into());
        }

        self.metrics.lock().request_count += 1;

        let deadline = timeout.unwrap_or_else(|| self.config.timeout());
        let started = Instant::now();

        match tokio::time::timeout(deadline, operation()).await {
            Ok(Ok(value)) => {
                self.on_success(started.elapsed());
                Ok(value)
            }
            Ok(Err(error)) => {
                self.on_failure(&error, false);
                Err(error)
            }
            Err(_) => {
                let error: ResilienceError = CircuitBreakerError::Timeout {
                    name: self.config.name.clone(),
                    timeout: deadline,
                }
                .into();
                self.on_failure(&error, true);
                Err(error)
            }
        }
    }

    fn on_success(&self, elapsed: Duration) {
        let response_time_ms = elapsed.as_millis() as u64;
        {
            let mut metrics = self.metrics.lock();
            metrics.success_count += 1;
            metrics.total_response_time_ms += response_time_ms;
        }
        let transition = self.core.on_success();
        self.events.emit(ResilienceEvent::Success {
            breaker: self.config.name.clone(),
            response_time_ms,
        });
        self.publish_transition(transition);
    }

    fn on_failure(&self, error: &ResilienceError, timed_out: bool) {
        let window = {
            let mut metrics = self.metrics.lock();
            metrics.failure_count += 1;
            if timed_out {
                metrics.timeout_count += 1;
            }
            WindowCounts {
                requests: metrics.request_count,
                failures: metrics.failure_count,
            }
        };
        let transition = self.core.on_failure(window);
        debug!(
            "Circuit breaker '{}' recorded failure: {}",
            self.config.name, error
        );
        self.events.emit(ResilienceEvent::Failure {
            breaker: self.config.name.clone(),
            error: error.to_string(),
        });
        self.publish_transition(transition);
    }

    fn publish_transition(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        match to {
            CircuitState::Open => warn!(
                "Circuit breaker '{}' transitioning from {} to OPEN",
                self.config.name, from
            ),
            _ => info!(
                "Circuit breaker '{}' transitioning from {} to {}",
                self.config.name, from, to
            ),
        }
        self.events.emit(ResilienceEvent::StateChange {
            breaker: self.config.name.clone(),
            from,
            to,
        });
    }

    /// Get current circuit breaker state
    pub fn state(&self) -> CircuitState {
        self.core.state()
    }

    /// Counters of the current window
    pub fn metrics(&self) -> CircuitMetrics {
        self.metrics.lock().clone()
    }

    /// Counters of the last completed window, if one has been rolled
    pub fn previous_window(&self) -> Option<CircuitMetrics> {
        self.previous_window.lock().clone()
    }

    /// Derived statistics, computed on demand
    pub fn stats(&self) -> CircuitBreakerStats {
        let snapshot = self.core.snapshot();
        let metrics = self.metrics();
        CircuitBreakerStats {
            name: self.config.name.clone(),
            state: snapshot.state,
            failure_count: snapshot.failure_count,
            success_count: snapshot.success_count,
            error_rate: metrics.error_rate(),
            average_response_time_ms: metrics.average_response_time_ms(),
            uptime_ms: self.created_at.elapsed().as_millis() as u64,
            last_failure_time: snapshot.last_failure_time,
            last_success_time: snapshot.last_success_time,
            next_attempt_in_ms: snapshot.next_attempt_in.map(|d| d.as_millis() as u64),
            metrics,
        }
    }

    /// Operator override: open now
    pub fn force_open(&self) {
        warn!("Circuit breaker '{}' forced open", self.config.name);
        let transition = self.core.force_open();
        self.publish_transition(transition);
    }

    /// Operator override: close now
    pub fn force_close(&self) {
        info!("Circuit breaker '{}' forced closed", self.config.name);
        let transition = self.core.force_close();
        self.publish_transition(transition);
    }

    /// Reset the circuit breaker and its window
    pub fn reset(&self) {
        let transition = self.core.reset();
        *self.metrics.lock() = CircuitMetrics::default();
        *self.previous_window.lock() = None;
        debug!("Circuit breaker '{}' reset", self.config.name);
        self.publish_transition(transition);
    }

    /// Close the current metrics window and start a fresh one.
    ///
    /// Returns the completed window.
    pub fn roll_window(&self) -> CircuitMetrics {
        let completed = std::mem::take(&mut *self.metrics.lock());
        *self.previous_window.lock() = Some(completed.clone());
        completed
    }

    /// Roll the metrics window every monitoring period.
    ///
    /// The task holds only a weak reference and ends once the breaker is
    /// dropped. Returns `None` outside a Tokio runtime.
    pub fn spawn_monitor(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let weak = Arc::downgrade(self);
        let period = self.config.monitoring_period();

        Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(breaker) = weak.upgrade() else {
                    break;
                };
                let window = breaker.roll_window();
                debug!(
                    "Circuit breaker '{}' window closed: {} requests, {} failures, {} rejected",
                    breaker.name(),
                    window.request_count,
                    window.failure_count,
                    window.rejected_count
                );
            }
        }))
    }
}
