//! Per-agent failure handling

use super::strategies::{RecoveryStrategy, default_strategies};
use super::types::{ErrorContext, ErrorStats, RecoveryConfig};
use crate::agent::{Agent, AgentResult, Task};
use crate::breaker::{Admission, AgentTripPolicy, CircuitState, KeyedBreakers, Transition, WindowCounts};
use crate::error::ResilienceError;
use crate::events::{EventBus, ResilienceEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Recent errors included in [`ErrorStats`]
const RECENT_ERRORS_IN_STATS: usize = 10;

#[derive(Debug, Default)]
struct Counters {
    total_errors: u64,
    errors_by_agent: HashMap<String, u64>,
    errors_by_kind: HashMap<String, u64>,
    recoveries_attempted: u64,
    recoveries_succeeded: u64,
    rejected: u64,
    strategy_usage: HashMap<String, u64>,
}

/// Turns agent failures into recovered or structured failure results.
///
/// Each agent gets its own breaker; while it is open failures are rejected
/// without running any strategy.
pub struct ErrorRecoveryManager {
    config: RecoveryConfig,
    breakers: KeyedBreakers<String, AgentTripPolicy>,
    strategies: RwLock<Vec<Arc<dyn RecoveryStrategy>>>,
    history: Mutex<VecDeque<ErrorContext>>,
    counters: Mutex<Counters>,
    events: EventBus,
}

impl std::fmt::Debug for ErrorRecoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorRecoveryManager")
            .field("config", &self.config)
            .field("strategies", &self.strategy_names())
            .field("agents", &self.breakers.len())
            .finish()
    }
}

impl ErrorRecoveryManager {
    /// Manager with the built-in strategies
    pub fn new(config: RecoveryConfig, events: EventBus) -> Self {
        let strategies = default_strategies(config.backoff.clone());
        let policy = AgentTripPolicy {
            failure_threshold: config.agent_failure_threshold,
            success_threshold: config.agent_success_threshold,
            recovery_time: config.agent_recovery_time(),
        };
        let history = VecDeque::with_capacity(config.error_history_size.min(1024));
        Self {
            breakers: KeyedBreakers::new(policy),
            strategies: RwLock::new(strategies),
            history: Mutex::new(history),
            counters: Mutex::new(Counters::default()),
            config,
            events,
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Add a strategy, keeping the list ordered by priority.
    /// Equal priorities keep registration order.
    pub fn register_strategy(&self, strategy: Arc<dyn RecoveryStrategy>) {
        info!(
            "Registered recovery strategy '{}' with priority {}",
            strategy.name(),
            strategy.priority()
        );
        let mut strategies = self.strategies.write();
        strategies.push(strategy);
        strategies.sort_by_key(|s| s.priority());
    }

    pub fn remove_strategy(&self, name: &str) -> bool {
        let mut strategies = self.strategies.write();
        let before = strategies.len();
        strategies.retain(|s| s.name() != name);
        strategies.len() != before
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies
            .read()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Handle a failure of `agent` running `task`.
    ///
    /// Never returns an error: the outcome is a recovered (possibly degraded)
    /// result or a structured failure.
    pub async fn handle_error(
        &self,
        agent: &dyn Agent,
        task: &Task,
        error: &ResilienceError,
        attempt: u32,
    ) -> AgentResult {
        let started = Instant::now();
        let agent_id = agent.id().to_string();
        let context = ErrorContext::new(&agent_id, &task.id, error, attempt, self.config.max_attempts)
            .with_metadata(task.metadata.clone());
        self.record(context.clone());

        let breaker = self.breakers.get(&agent_id);
        let (admission, transition) = breaker.admit();
        self.log_transition(&agent_id, transition);

        if let Admission::Rejected { retry_after } = admission {
            self.counters.lock().rejected += 1;
            warn!(
                "Agent {} circuit breaker is open, rejecting task {}",
                agent_id, task.id
            );
            return AgentResult::failure(
                &agent_id,
                &task.id,
                format!(
                    "Agent {} circuit breaker is open, retry after {:?}: {}",
                    agent_id, retry_after, context.error
                ),
            )
            .with_attempts(attempt);
        }

        let Some(strategy) = self.select_strategy(&context) else {
            error!(
                "No recovery strategy applicable for agent {} task {}: {}",
                agent_id, task.id, context.error
            );
            self.log_transition(&agent_id, breaker.on_failure(WindowCounts::default()));
            return AgentResult::failure(
                &agent_id,
                &task.id,
                format!("No recovery strategy available: {}", context.error),
            )
            .with_attempts(attempt);
        };

        let name = strategy.name().to_string();
        debug!(
            "Applying recovery strategy '{}' to agent {} task {}",
            name, agent_id, task.id
        );
        {
            let mut counters = self.counters.lock();
            counters.recoveries_attempted += 1;
            *counters.strategy_usage.entry(name.clone()).or_insert(0) += 1;
        }

        let outcome = strategy.execute(&context, agent, task).await;

        // A degraded placeholder does not show the agent itself recovered
        let recovered = matches!(&outcome, Ok(result) if result.success && !result.degraded);
        let transition = if recovered {
            breaker.on_success()
        } else {
            breaker.on_failure(WindowCounts::default())
        };
        self.log_transition(&agent_id, transition);

        let result = match outcome {
            Ok(result) if result.success => {
                self.counters.lock().recoveries_succeeded += 1;
                info!(
                    "Recovery strategy '{}' succeeded for agent {} task {}",
                    name, agent_id, task.id
                );
                result.recovered_by(&name)
            }
            Ok(result) => result,
            Err(strategy_error) => {
                warn!(
                    "Recovery strategy '{}' failed for agent {} task {}: {}",
                    name, agent_id, task.id, strategy_error
                );
                AgentResult::failure(
                    &agent_id,
                    &task.id,
                    format!("Recovery strategy '{}' failed: {}", name, strategy_error),
                )
            }
        };

        self.events.emit(ResilienceEvent::RecoveryAttempted {
            agent_id: agent_id.clone(),
            task_id: task.id.clone(),
            strategy: name,
            success: result.success,
        });

        result
            .with_attempts(attempt + 1)
            .with_duration(started.elapsed())
    }

    fn select_strategy(&self, context: &ErrorContext) -> Option<Arc<dyn RecoveryStrategy>> {
        self.strategies
            .read()
            .iter()
            .find(|s| s.can_handle(context))
            .cloned()
    }

    fn record(&self, context: ErrorContext) {
        {
            let mut counters = self.counters.lock();
            counters.total_errors += 1;
            *counters
                .errors_by_agent
                .entry(context.agent_id.clone())
                .or_insert(0) += 1;
            *counters
                .errors_by_kind
                .entry(context.error_kind.clone())
                .or_insert(0) += 1;
        }

        let mut history = self.history.lock();
        if history.len() >= self.config.error_history_size {
            history.pop_front();
        }
        if self.config.error_history_size > 0 {
            history.push_back(context);
        }
    }

    fn log_transition(&self, agent_id: &str, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        match to {
            CircuitState::Open => warn!(
                "Agent {} circuit breaker transitioning from {} to OPEN",
                agent_id, from
            ),
            _ => info!(
                "Agent {} circuit breaker transitioning from {} to {}",
                agent_id, from, to
            ),
        }
    }

    /// Breaker state of `agent_id`; agents never seen are closed
    pub fn agent_breaker_state(&self, agent_id: &str) -> CircuitState {
        self.breakers.state(&agent_id.to_string())
    }

    /// Forget the breaker of `agent_id`
    pub fn reset_agent(&self, agent_id: &str) -> bool {
        self.breakers.reset(&agent_id.to_string())
    }

    /// The last `n` recorded errors, oldest first
    pub fn recent_errors(&self, n: usize) -> Vec<ErrorContext> {
        let history = self.history.lock();
        history
            .iter()
            .skip(history.len().saturating_sub(n))
            .cloned()
            .collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn error_stats(&self) -> ErrorStats {
        let counters = self.counters.lock();
        ErrorStats {
            total_errors: counters.total_errors,
            errors_by_agent: counters.errors_by_agent.clone(),
            errors_by_kind: counters.errors_by_kind.clone(),
            recoveries_attempted: counters.recoveries_attempted,
            recoveries_succeeded: counters.recoveries_succeeded,
            rejected: counters.rejected,
            strategy_usage: counters.strategy_usage.clone(),
            recent_errors: self.recent_errors(RECENT_ERRORS_IN_STATS),
        }
    }
}
