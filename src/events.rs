//! Typed event channel for resilience signals
//!
//! Every component receives an [`EventBus`] explicitly and publishes
//! [`ResilienceEvent`]s to it. Subscribers get a bounded broadcast receiver;
//! slow subscribers lag instead of blocking publishers.

use crate::breaker::CircuitState;
use crate::degradation::DegradationLevel;
use crate::health::HealthStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Signals published by the resilience components
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResilienceEvent {
    /// A circuit breaker moved between states
    StateChange {
        breaker: String,
        from: CircuitState,
        to: CircuitState,
    },
    /// A protected call succeeded
    Success {
        breaker: String,
        response_time_ms: u64,
    },
    /// A protected call failed
    Failure { breaker: String, error: String },
    /// A call was rejected without invoking the operation
    RequestRejected { breaker: String },
    /// A retry is about to happen after a delay
    Retry {
        handler: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    /// The system moved to a more restricted level
    SystemDegraded {
        from: DegradationLevel,
        to: DegradationLevel,
        reason: String,
    },
    /// The system returned to full service
    SystemRecovered { from: DegradationLevel },
    FeatureDisabled { feature: String },
    FeatureEnabled { feature: String },
    /// A fallback was substituted for a service
    FallbackActivated { service: String, fallback: String },
    /// An agent failed its health check
    AgentUnhealthy { agent_id: String, error: String },
    /// A full health check cycle finished
    HealthCheckCompleted {
        status: HealthStatus,
        agents: usize,
        timestamp: DateTime<Utc>,
    },
    /// A recovery strategy ran for an agent failure
    RecoveryAttempted {
        agent_id: String,
        task_id: String,
        strategy: String,
        success: bool,
    },
}

/// Cloneable handle to a bounded broadcast channel of [`ResilienceEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ResilienceEvent>,
}

impl EventBus {
    /// Create a new bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all subsequent events
    pub fn subscribe(&self) -> broadcast::Receiver<ResilienceEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; a bus without subscribers drops it
    pub fn emit(&self, event: ResilienceEvent) {
        if self.sender.send(event).is_err() {
            trace!("No event subscribers");
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
