//! Configuration integration tests
//!
//! A single YAML file configuring every component.

#[cfg(test)]
mod tests {
    use agent_resilience::breaker::CircuitBreakerManager;
    use agent_resilience::config::ResilienceConfig;
    use agent_resilience::degradation::{
        DegradationLevel, GracefulDegradationManager, RequestMetrics, SystemMetrics,
        SystemMetricsCollector,
    };
    use agent_resilience::error::ResilienceError;
    use agent_resilience::events::EventBus;
    use agent_resilience::health::SystemHealthMonitor;
    use agent_resilience::recovery::ErrorRecoveryManager;
    use agent_resilience::retry::{BackoffStrategy, RetryHandler};
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
circuit_breaker:
  failure_threshold: 2
  recovery_timeout_ms: 5000

retry:
  max_attempts: 4
  strategy: exponential
  initial_delay_ms: 50
  max_delay_ms: 400

recovery:
  agent_failure_threshold: 3
  max_attempts: 2
  resilient_agent:
    inline_attempts: 1

health:
  check_interval_ms: 10000
  check_timeout_ms: 1000

degradation:
  evaluation_interval_ms: 2000
  rules:
    - id: hot-cpu
      name: CPU saturated
      priority: 75
      triggers:
        - type: resource_usage
          resource: cpu
          threshold: 0.9
      actions:
        - type: disable_feature
          feature: thumbnails
        - type: throttle
          service: uploads
          max_requests_per_second: 2

logging:
  level: "agent_resilience=debug"
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_config_file_drives_every_component() {
        let file = write_config(CONFIG);
        let config = ResilienceConfig::from_file(file.path()).await.unwrap();
        let events = EventBus::default();

        let breakers = CircuitBreakerManager::new(config.circuit_breaker.clone(), events.clone())
            .without_monitoring();
        let cb = breakers.get_or_create("storage", None);
        assert_eq!(cb.config().failure_threshold, 2);
        assert_eq!(cb.config().recovery_timeout(), Duration::from_secs(5));

        let retry = RetryHandler::new("storage", config.retry.clone(), events.clone());
        assert_eq!(retry.config().strategy, BackoffStrategy::Exponential);
        assert_eq!(retry.config().max_attempts, 4);

        let recovery = ErrorRecoveryManager::new(config.recovery.clone(), events.clone());
        assert_eq!(recovery.config().resilient_agent.inline_attempts, 1);

        let monitor = SystemHealthMonitor::new(config.health.clone(), events.clone());
        assert_eq!(monitor.config().check_timeout(), Duration::from_secs(1));

        let collector =
            SystemMetricsCollector::new(Arc::new(RequestMetrics::new(10))).without_resources();
        let degradation =
            GracefulDegradationManager::new(config.degradation.clone(), Arc::new(collector), events);
        assert_eq!(degradation.rule_ids(), vec!["hot-cpu".to_string()]);

        let mut metrics = SystemMetrics::default();
        metrics.resource_usage.cpu = 0.97;
        assert_eq!(degradation.evaluate_metrics(metrics), DegradationLevel::MinimalService);
        assert!(!degradation.is_feature_enabled("thumbnails"));
        assert_eq!(degradation.throttle_limit("uploads"), Some(2));
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let file = write_config("circuit_breaker:\n  error_threshold: 2.0\n");
        let err = ResilienceConfig::from_file(file.path()).await.unwrap_err();
        assert!(matches!(err, ResilienceError::Config(_)));
        assert!(err.to_string().contains("error_threshold"));
    }

    #[tokio::test]
    async fn test_unparseable_rule_is_rejected() {
        let file = write_config("degradation:\n  rules:\n    - id: x\n      priority: high\n");
        let err = ResilienceConfig::from_file(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
