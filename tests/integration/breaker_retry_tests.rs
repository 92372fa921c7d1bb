//! Circuit breaker and retry integration tests
//!
//! Drives breakers through their full CLOSED, OPEN, HALF_OPEN cycle and
//! composes them with retry handlers.

#[cfg(test)]
mod tests {
    use crate::common::ConfigFactory;
    use agent_resilience::breaker::{CircuitBreaker, CircuitBreakerManager, CircuitState};
    use agent_resilience::error::{ResilienceError, Result};
    use agent_resilience::events::{EventBus, ResilienceEvent};
    use agent_resilience::health::HealthStatus;
    use agent_resilience::protect::Protection;
    use agent_resilience::retry::{RetryHandler, RetryManager};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn fail(cb: &CircuitBreaker, calls: &AtomicU32) -> Result<()> {
        cb.execute(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ResilienceError::operation("ServiceUnavailable", "503"))
            },
            None,
        )
        .await
    }

    async fn succeed(cb: &CircuitBreaker, calls: &AtomicU32) -> Result<&'static str> {
        cb.execute(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("ok")
            },
            None,
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_breaker_cycle() {
        let events = EventBus::new(64);
        let mut rx = events.subscribe();
        let cb = CircuitBreaker::new(ConfigFactory::breaker("payments", 3), events);
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            assert!(fail(&cb, &calls).await.is_err());
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // Fails fast without touching the operation
        let err = succeed(&cb, &calls).await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cb.stats().next_attempt_in_ms.is_some());

        tokio::time::advance(Duration::from_millis(1001)).await;

        assert_eq!(succeed(&cb, &calls).await.unwrap(), "ok");
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(succeed(&cb, &calls).await.unwrap(), "ok");
        assert_eq!(cb.state(), CircuitState::Closed);

        let mut transitions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ResilienceEvent::StateChange { from, to, .. } = event {
                transitions.push((from, to));
            }
        }
        assert_eq!(
            transitions,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let cb = CircuitBreaker::new(ConfigFactory::breaker("search", 2), EventBus::default());
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        fail(&cb, &calls).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1001)).await;
        fail(&cb, &calls).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        // A fresh recovery window starts from the failed probe
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(succeed(&cb, &calls).await.unwrap_err().is_rejection());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_health_tracks_open_breakers() {
        let manager =
            CircuitBreakerManager::new(ConfigFactory::breaker("default", 1), EventBus::default())
                .without_monitoring();
        let calls = AtomicU32::new(0);

        for name in ["db", "cache", "queue"] {
            let cb = manager.get_or_create(name, None);
            succeed(&cb, &calls).await.unwrap();
        }
        assert_eq!(manager.health().status, HealthStatus::Healthy);

        fail(&manager.get_or_create("db", None), &calls).await.unwrap_err();
        let health = manager.health();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.open_breakers, vec!["db".to_string()]);

        fail(&manager.get_or_create("cache", None), &calls).await.unwrap_err();
        assert_eq!(manager.health().status, HealthStatus::Unhealthy);

        manager.reset_all();
        assert_eq!(manager.health().status, HealthStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_through_breaker_manager() {
        let events = EventBus::default();
        let breakers =
            CircuitBreakerManager::new(ConfigFactory::breaker("default", 5), events.clone())
                .without_monitoring();
        let retries = RetryManager::new(ConfigFactory::retry(4), events);
        let calls = AtomicU32::new(0);

        let value = retries
            .execute("inventory", || {
                breakers.execute(
                    "inventory",
                    || async {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(ResilienceError::operation("ConnectionReset", "peer reset"))
                        } else {
                            Ok(42)
                        }
                    },
                    None,
                )
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        let stats = breakers.get("inventory").unwrap().stats();
        assert_eq!(stats.metrics.failure_count, 2);
        assert_eq!(stats.metrics.success_count, 1);
        assert_eq!(retries.all_stats()["inventory"].success_after_retry, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_timeout_is_retried_then_exhausted() {
        let cb = Arc::new(CircuitBreaker::new(
            ConfigFactory::breaker("slow", 10),
            EventBus::default(),
        ));
        let retry = Arc::new(RetryHandler::standalone(ConfigFactory::retry(3)));
        let protection = Protection::new()
            .with_circuit_breaker(cb.clone())
            .with_retry(retry.clone());

        let err = protection
            .run(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();

        match err {
            ResilienceError::RetryExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(source.is_timeout());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cb.metrics().timeout_count, 3);
        assert_eq!(retry.stats().ultimate_failures, 1);
    }
}
