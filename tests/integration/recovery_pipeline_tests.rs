//! Recovery pipeline integration tests
//!
//! Agents wrapped in `ResilientAgent`, recovered by `ErrorRecoveryManager`
//! and probed by `SystemHealthMonitor`.

#[cfg(test)]
mod tests {
    use crate::common::assertions::AgentResultAssertions;
    use crate::common::{ConfigFactory, FlakyAgent, SlowAgent};
    use agent_resilience::agent::{Agent, Task};
    use agent_resilience::breaker::CircuitState;
    use agent_resilience::events::{EventBus, ResilienceEvent};
    use agent_resilience::health::{HealthMonitorConfig, HealthStatus, SystemHealthMonitor};
    use agent_resilience::recovery::{ErrorRecoveryManager, ResilientAgent};
    use std::sync::Arc;
    use std::time::Duration;

    fn recovery(inline_attempts: u32, agent_failure_threshold: u32) -> Arc<ErrorRecoveryManager> {
        Arc::new(ErrorRecoveryManager::new(
            ConfigFactory::recovery(inline_attempts, agent_failure_threshold),
            EventBus::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_retry_absorbs_transient_failure() {
        let inner = FlakyAgent::new("writer", 1, "connection reset");
        let recovery = recovery(2, 5);
        let agent = ResilientAgent::with_defaults(inner.clone(), recovery.clone());

        let result = agent.execute(&Task::new("draft")).await.unwrap();

        assert!(result.success);
        assert!(result.recovered_by.is_none());
        assert_eq!(result.attempts, 2);
        assert_eq!(inner.calls(), 2);
        assert_eq!(recovery.history_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_strategy_recovers_after_inline_attempts() {
        let inner = FlakyAgent::new("writer", 2, "connection reset");
        let recovery = recovery(2, 5);
        let agent = ResilientAgent::with_defaults(inner.clone(), recovery.clone());

        let result = agent.execute(&Task::new("draft")).await.unwrap();

        result.assert_recovered_by("exponential_backoff_retry");
        assert_eq!(result.attempts, 3);
        assert_eq!(inner.calls(), 3);

        let stats = recovery.error_stats();
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.recoveries_succeeded, 1);
        assert_eq!(recovery.agent_breaker_state("writer"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_cleanup_after_attempt_budget() {
        let inner = FlakyAgent::new("indexer", 3, "connection pool exhausted");
        let recovery = recovery(3, 5);
        let agent = ResilientAgent::with_defaults(inner.clone(), recovery.clone());

        let result = agent.execute(&Task::new("index")).await.unwrap();

        result.assert_recovered_by("resource_cleanup");
        assert_eq!(inner.cleanups(), 1);
        assert_eq!(inner.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_degrades_then_trips_agent_breaker() {
        let events = EventBus::new(64);
        let mut rx = events.subscribe();
        let recovery = Arc::new(ErrorRecoveryManager::new(ConfigFactory::recovery(3, 2), events));
        let inner = FlakyAgent::broken("planner", "invariant violated");
        let agent = ResilientAgent::with_defaults(inner.clone(), recovery.clone());

        for _ in 0..2 {
            let result = agent.execute(&Task::new("plan")).await.unwrap();
            assert!(result.success);
            assert!(result.degraded);
            assert_eq!(result.recovered_by.as_deref(), Some("graceful_degradation"));
        }
        assert_eq!(recovery.agent_breaker_state("planner"), CircuitState::Open);

        let calls_before = inner.calls();
        let result = agent.execute(&Task::new("plan")).await.unwrap();
        result.assert_failed_with("circuit breaker is open");
        // Inline attempts still ran; recovery itself did not touch the agent
        assert_eq!(inner.calls(), calls_before + 3);

        let mut recoveries = 0;
        while let Ok(event) = rx.try_recv() {
            if let ResilienceEvent::RecoveryAttempted { strategy, .. } = event {
                assert_eq!(strategy, "graceful_degradation");
                recoveries += 1;
            }
        }
        assert_eq!(recoveries, 2);

        assert!(recovery.reset_agent("planner"));
        assert_eq!(recovery.agent_breaker_state("planner"), CircuitState::Closed);
        assert_eq!(recovery.error_stats().rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_recovery_extends_deadline_once() {
        let mut config = ConfigFactory::recovery(1, 5);
        config.max_attempts = 1;
        let recovery = Arc::new(ErrorRecoveryManager::new(config, EventBus::default()));
        let agent = ResilientAgent::with_defaults(
            SlowAgent::new("renderer", Duration::from_secs(10)),
            recovery.clone(),
        );

        let task = Task::new("render").with_timeout(Duration::from_secs(1));
        let result = agent.execute(&task).await.unwrap();

        // Twice the deadline is still short of the agent's delay
        result.assert_failed_with("timeout_recovery");
        let recent = recovery.recent_errors(1);
        assert_eq!(recent.len(), 1);
        assert!(recent[0].error.contains("timed out"));
        assert_eq!(recovery.error_stats().strategy_usage.get("timeout_recovery"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_monitor_sees_saturated_agent() {
        let recovery = recovery(1, 5);
        let agent = Arc::new(ResilientAgent::with_defaults(
            SlowAgent::new("transcoder", Duration::from_secs(30)),
            recovery,
        ));
        let monitor = SystemHealthMonitor::new(HealthMonitorConfig::default(), EventBus::default());
        monitor.register_agent(agent.clone());

        let busy = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.execute(&Task::new("encode")).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(agent.in_flight(), 1);
        assert!(!agent.is_available());

        let result = monitor.check_agent("transcoder").await.unwrap();
        assert_eq!(result.status, HealthStatus::Degraded);
        assert_eq!(result.error.as_deref(), Some("Agent at capacity"));
        assert_eq!(monitor.system_health().status, HealthStatus::Degraded);

        busy.abort();
    }

    #[tokio::test]
    async fn test_health_monitor_marks_broken_agent_unhealthy() {
        let monitor = SystemHealthMonitor::new(HealthMonitorConfig::default(), EventBus::default());
        monitor.register_agent(FlakyAgent::broken("crawler", "segfault"));
        monitor.register_agent(FlakyAgent::new("summarizer", 0, ""));

        let report = monitor.check_all().await;
        assert_eq!(report.healthy, 1);
        assert_eq!(report.unhealthy, 1);
        assert_eq!(report.status, HealthStatus::Unhealthy);

        let crawler = monitor.agent_health("crawler").unwrap();
        assert_eq!(crawler.consecutive_failures, 1);
    }
}
