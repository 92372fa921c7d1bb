//! Tests for retry handling

#[cfg(test)]
mod tests {
    use super::super::{
        BackoffStrategy, RetryConfig, RetryHandler, RetryHooks, RetryManager, base_delay,
        delay_for, retry_exponential_jitter, retry_fixed, retry_linear,
    };
    use crate::error::{ResilienceError, Result};
    use crate::events::{EventBus, ResilienceEvent};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 10,
            strategy: BackoffStrategy::Fixed,
            ..RetryConfig::default()
        }
    }

    /// Operation that fails `failures` times with `name`, then succeeds
    fn flaky(
        counter: Arc<AtomicU32>,
        failures: u32,
        name: &'static str,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<u32>> + Send>>
    {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(ResilienceError::operation(name, format!("attempt {}", n + 1)))
                } else {
                    Ok(n + 1)
                }
            })
        }
    }

    // ==================== Backoff ====================

    #[test]
    fn test_exponential_delays_are_clipped() {
        let config = RetryConfig {
            initial_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: 1000,
            strategy: BackoffStrategy::Exponential,
            jitter_max_ms: 500,
            ..RetryConfig::default()
        };
        let delays: Vec<u64> = (1..=6)
            .map(|attempt| delay_for(&config, attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_linear_and_fixed_delays() {
        let linear = RetryConfig {
            initial_delay_ms: 100,
            multiplier: 1.5,
            max_delay_ms: 10_000,
            strategy: BackoffStrategy::Linear,
            ..RetryConfig::default()
        };
        assert_eq!(base_delay(&linear, 1), Duration::from_millis(150));
        assert_eq!(base_delay(&linear, 4), Duration::from_millis(600));

        let fixed = RetryConfig::fixed(3, Duration::from_millis(250));
        assert_eq!(base_delay(&fixed, 1), Duration::from_millis(250));
        assert_eq!(base_delay(&fixed, 9), Duration::from_millis(250));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig {
            initial_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: 10_000,
            jitter_max_ms: 50,
            strategy: BackoffStrategy::ExponentialJitter,
            ..RetryConfig::default()
        };
        for _ in 0..100 {
            let delay = delay_for(&config, 2).as_millis() as u64;
            assert!((200..=250).contains(&delay), "delay {delay} out of range");
        }
    }

    // ==================== Classification ====================

    #[test]
    fn test_deny_list_checked_first() {
        let config = RetryConfig {
            retryable_errors: vec!["ValidationError".to_string()],
            non_retryable_errors: vec!["ValidationError".to_string()],
            ..RetryConfig::default()
        };
        let error = ResilienceError::operation("ValidationError", "bad input");
        assert!(!config.is_retryable(&error));
    }

    #[test]
    fn test_allow_list_restricts_retries() {
        let config = RetryConfig {
            retryable_errors: vec!["NetworkError".to_string(), "timeout".to_string()],
            non_retryable_errors: vec![],
            ..RetryConfig::default()
        };
        assert!(config.is_retryable(&ResilienceError::operation("NetworkError", "reset")));
        assert!(config.is_retryable(&ResilienceError::operation("Error", "request timeout")));
        assert!(!config.is_retryable(&ResilienceError::operation("ParseError", "bad json")));
    }

    #[test]
    fn test_empty_allow_list_retries_everything_not_denied() {
        let config = RetryConfig {
            retryable_errors: vec![],
            non_retryable_errors: vec!["AuthenticationError".to_string()],
            ..RetryConfig::default()
        };
        assert!(config.is_retryable(&ResilienceError::agent("anything")));
        assert!(!config.is_retryable(&ResilienceError::operation("AuthenticationError", "401")));
    }

    // ==================== Execution ====================

    #[tokio::test]
    async fn test_first_try_success_is_not_a_recovery() {
        let handler = RetryHandler::standalone(fast_config(3));
        let counter = Arc::new(AtomicU32::new(0));

        let result = handler.execute(flaky(counter, 0, "NetworkError"), None).await.unwrap();
        assert_eq!(result.attempts, 1);
        assert!(!result.recovered());

        let stats = handler.stats();
        assert_eq!(stats.success_after_retry, 0);
        assert_eq!(stats.total_executions, 1);
    }

    #[tokio::test]
    async fn test_success_after_retries_keeps_prior_errors() {
        let handler = RetryHandler::standalone(fast_config(3));
        let counter = Arc::new(AtomicU32::new(0));

        let result = handler
            .execute(flaky(counter.clone(), 2, "NetworkError"), None)
            .await
            .unwrap();
        assert_eq!(result.result, 3);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].to_string().contains("attempt 1"));

        let stats = handler.stats();
        assert_eq!(stats.success_after_retry, 1);
        assert_eq!(stats.total_retries, 2);
        assert_eq!(stats.error_counts.get("NetworkError"), Some(&2));
    }

    #[tokio::test]
    async fn test_exhaustion_returns_retryable_error() {
        let handler = RetryHandler::standalone(fast_config(3));
        let counter = Arc::new(AtomicU32::new(0));

        let err = handler
            .execute(flaky(counter.clone(), 10, "NetworkError"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResilienceError::RetryExhausted { attempts: 3, .. }));
        assert_eq!(err.root_cause().name(), "NetworkError");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(handler.stats().ultimate_failures, 1);
    }

    #[tokio::test]
    async fn test_non_retryable_aborts_immediately() {
        let config = RetryConfig {
            retryable_errors: vec!["ValidationError".to_string()],
            non_retryable_errors: vec!["ValidationError".to_string()],
            ..fast_config(5)
        };
        let handler = RetryHandler::standalone(config);
        let counter = Arc::new(AtomicU32::new(0));

        let err = handler
            .execute(flaky(counter.clone(), 10, "ValidationError"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResilienceError::NonRetryable { attempts: 1, .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_config_override_applies_per_call() {
        let handler = RetryHandler::standalone(fast_config(5));
        let counter = Arc::new(AtomicU32::new(0));

        let err = handler
            .execute(flaky(counter.clone(), 10, "NetworkError"), Some(&fast_config(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, ResilienceError::RetryExhausted { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_are_observed_between_attempts() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
            strategy: BackoffStrategy::Exponential,
            ..RetryConfig::default()
        };
        let handler = RetryHandler::standalone(config);
        let counter = Arc::new(AtomicU32::new(0));

        let started = tokio::time::Instant::now();
        let result = handler
            .execute(flaky(counter, 3, "NetworkError"), None)
            .await
            .unwrap();
        assert_eq!(result.attempts, 4);
        // 100 + 200 + 400
        assert!(started.elapsed() >= Duration::from_millis(700));
    }

    #[tokio::test]
    async fn test_hooks_fire_at_each_transition() {
        let retries = Arc::new(Mutex::new(Vec::new()));
        let failed = Arc::new(AtomicU32::new(0));
        let r = retries.clone();
        let f = failed.clone();

        let handler = RetryHandler::standalone(fast_config(3)).with_hooks(
            RetryHooks::new()
                .on_retry(move |attempt, _, _| r.lock().push(attempt))
                .on_failure(move |attempts, _| {
                    f.store(attempts, Ordering::SeqCst);
                }),
        );

        let counter = Arc::new(AtomicU32::new(0));
        let _ = handler.execute(flaky(counter, 10, "NetworkError"), None).await;

        assert_eq!(*retries.lock(), vec![1, 2]);
        assert_eq!(failed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_events_published() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let handler = RetryHandler::new("events", fast_config(2), bus);
        let counter = Arc::new(AtomicU32::new(0));

        handler.execute(flaky(counter, 1, "NetworkError"), None).await.unwrap();

        match rx.try_recv().unwrap() {
            ResilienceEvent::Retry { handler, attempt, .. } => {
                assert_eq!(handler, "events");
                assert_eq!(attempt, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    // ==================== Manager & Convenience ====================

    #[tokio::test]
    async fn test_manager_reuses_handlers_and_aggregates_stats() {
        let manager = RetryManager::new(fast_config(3), EventBus::default());
        let counter = Arc::new(AtomicU32::new(0));

        let value = manager
            .execute("db", flaky(counter.clone(), 1, "NetworkError"))
            .await
            .unwrap();
        assert_eq!(value, 2);

        let a = manager.get_or_create("db", None);
        let b = manager.get_or_create("db", Some(fast_config(9)));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.config().max_attempts, 3);

        let stats = manager.all_stats();
        assert_eq!(stats["db"].success_after_retry, 1);

        manager.reset_stats();
        assert_eq!(manager.all_stats()["db"].total_executions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_convenience_entry_points() {
        let counter = Arc::new(AtomicU32::new(0));
        assert_eq!(
            retry_exponential_jitter(flaky(counter, 1, "NetworkError"), 3)
                .await
                .unwrap(),
            2
        );

        let counter = Arc::new(AtomicU32::new(0));
        assert_eq!(
            retry_linear(flaky(counter, 2, "NetworkError"), 3, Duration::from_millis(10))
                .await
                .unwrap(),
            3
        );

        let counter = Arc::new(AtomicU32::new(0));
        assert!(
            retry_fixed(flaky(counter, 5, "NetworkError"), 2, Duration::from_millis(10))
                .await
                .is_err()
        );
    }
}
