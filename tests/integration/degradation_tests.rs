//! Degradation integration tests
//!
//! Degradation rules evaluated against metrics collected from live circuit
//! breakers and request outcomes.

#[cfg(test)]
mod tests {
    use crate::assert_approx_eq;
    use crate::common::{ConfigFactory, MetricsFactory};
    use agent_resilience::breaker::CircuitBreakerManager;
    use agent_resilience::degradation::{
        Action, DegradationConfig, DegradationLevel, DegradationRule, FallbackStrategy,
        GracefulDegradationManager, MetricsCollector, RequestMetrics, SystemMetricsCollector,
        Trigger,
    };
    use agent_resilience::error::{ResilienceError, Result};
    use agent_resilience::events::EventBus;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Quote {
        symbol: String,
        price: f64,
        stale: bool,
    }

    struct Stack {
        breakers: Arc<CircuitBreakerManager>,
        requests: Arc<RequestMetrics>,
        degradation: GracefulDegradationManager,
    }

    fn stack(rules: Vec<DegradationRule>) -> Stack {
        let events = EventBus::new(256);
        let breakers = Arc::new(
            CircuitBreakerManager::new(ConfigFactory::breaker("default", 1), events.clone())
                .without_monitoring(),
        );
        let requests = Arc::new(RequestMetrics::new(100));
        let collector = SystemMetricsCollector::new(requests.clone())
            .with_breakers(breakers.clone())
            .without_resources();
        let config = DegradationConfig {
            rules,
            ..DegradationConfig::default()
        };
        let degradation = GracefulDegradationManager::new(config, Arc::new(collector), events)
            .with_request_metrics(requests.clone());
        Stack {
            breakers,
            requests,
            degradation,
        }
    }

    async fn trip(breakers: &CircuitBreakerManager, name: &str) {
        let _ = breakers
            .execute(
                name,
                || async { Err::<(), _>(ResilienceError::operation("ServiceError", "down")) },
                None,
            )
            .await;
    }

    fn emergency_on_open_breakers() -> DegradationRule {
        DegradationRule::new("breakers-open", "Dependencies failing", 90)
            .with_trigger(Trigger::CircuitBreakerOpen { min_open: 2 })
    }

    #[tokio::test]
    async fn test_open_breakers_drive_emergency_mode() {
        let stack = stack(vec![emergency_on_open_breakers()]);
        stack.degradation.register_fallback(FallbackStrategy::fixed(
            "quote-cache",
            "quotes",
            1,
            json!({ "symbol": "ACME", "price": 0.0, "stale": true }),
        ));

        trip(&stack.breakers, "pricing-db").await;
        assert_eq!(stack.degradation.evaluate().await, DegradationLevel::FullService);

        trip(&stack.breakers, "market-feed").await;
        assert_eq!(stack.degradation.evaluate().await, DegradationLevel::EmergencyMode);
        assert!(!stack.degradation.is_feature_enabled("search"));

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let quote: Quote = stack
            .degradation
            .execute_with_fallback(
                "quotes",
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Quote {
                        symbol: "ACME".to_string(),
                        price: 12.5,
                        stale: false,
                    })
                },
                None,
            )
            .await
            .unwrap();
        assert!(quote.stale);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        stack.breakers.reset_all();
        assert_eq!(stack.degradation.evaluate().await, DegradationLevel::FullService);
        assert!(stack.degradation.is_feature_enabled("search"));
    }

    #[tokio::test]
    async fn test_request_failures_raise_error_rate() {
        let stack = stack(vec![
            DegradationRule::new("errors", "Error rate", 70)
                .with_trigger(Trigger::ErrorRate { threshold: 0.5 })
                .with_recovery_condition(|m| m.error_rate < 0.2)
                .with_action(Action::EnableCacheFallback {
                    service: "profile".to_string(),
                }),
        ]);

        let fresh: Result<serde_json::Value> = stack
            .degradation
            .execute_with_fallback("profile", || async { Ok(json!({ "name": "kim" })) }, None)
            .await;
        assert!(fresh.is_ok());

        for _ in 0..3 {
            let result: Result<serde_json::Value> = stack
                .degradation
                .execute_with_fallback(
                    "profile",
                    || async { Err(ResilienceError::agent("profile store down")) },
                    None,
                )
                .await;
            assert!(matches!(result, Err(ResilienceError::Agent(_))));
        }
        assert_approx_eq!(stack.requests.snapshot().error_rate, 0.75);

        assert_eq!(stack.degradation.evaluate().await, DegradationLevel::MinimalService);

        // The cache now answers for the failing service
        let cached: serde_json::Value = stack
            .degradation
            .execute_with_fallback(
                "profile",
                || async { Err(ResilienceError::agent("profile store down")) },
                None,
            )
            .await
            .unwrap();
        assert_eq!(cached["name"], json!("kim"));

        stack.requests.clear();
        for _ in 0..10 {
            stack.requests.record(std::time::Duration::from_millis(5), true);
        }
        assert_eq!(stack.degradation.evaluate().await, DegradationLevel::FullService);
    }

    #[tokio::test]
    async fn test_collector_reports_breaker_states() {
        let stack = stack(Vec::new());
        trip(&stack.breakers, "a").await;
        stack.breakers.get_or_create("b", None);

        let collector = SystemMetricsCollector::new(Arc::new(RequestMetrics::new(10)))
            .with_breakers(stack.breakers.clone())
            .without_resources();
        let metrics = collector.collect().await;

        assert_eq!(metrics.circuit_breakers.len(), 2);
        assert_eq!(metrics.open_circuits(), 1);
        // No request samples: the breaker error rate stands in
        assert_approx_eq!(metrics.error_rate, stack.breakers.overall_error_rate());
    }

    #[tokio::test]
    async fn test_levels_follow_highest_firing_rule() {
        let stack = stack(vec![
            emergency_on_open_breakers(),
            DegradationRule::new("errors", "Error rate", 55)
                .with_trigger(Trigger::ErrorRate { threshold: 0.1 }),
        ]);

        let degradation = &stack.degradation;
        assert_eq!(
            degradation.evaluate_metrics(MetricsFactory::with_error_rate(0.3)),
            DegradationLevel::PartialDegradation
        );
        assert_eq!(
            degradation.evaluate_metrics(MetricsFactory::with_open_breakers(3)),
            DegradationLevel::EmergencyMode
        );
        assert_eq!(
            degradation.evaluate_metrics(MetricsFactory::with_error_rate(0.0)),
            DegradationLevel::FullService
        );

        let levels: Vec<_> = degradation.history().iter().map(|c| c.to).collect();
        assert_eq!(
            levels,
            vec![
                DegradationLevel::PartialDegradation,
                DegradationLevel::EmergencyMode,
                DegradationLevel::FullService,
            ]
        );
    }
}
