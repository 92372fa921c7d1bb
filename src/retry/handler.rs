//! Retry mechanism with configurable backoff

use super::backoff::delay_for;
use super::types::{RetryConfig, RetryResult, RetryStats};
use crate::error::{ResilienceError, Result};
use crate::events::{EventBus, ResilienceEvent};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

type RetryCallback = Arc<dyn Fn(u32, &ResilienceError, Duration) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(u32, &ResilienceError) + Send + Sync>;
type SuccessCallback = Arc<dyn Fn(u32, Duration) + Send + Sync>;

/// Synchronous callbacks fired at each retry transition
#[derive(Clone, Default)]
pub struct RetryHooks {
    on_retry: Option<RetryCallback>,
    on_failure: Option<FailureCallback>,
    on_success: Option<SuccessCallback>,
}

impl RetryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the failed attempt, its error and the upcoming delay
    pub fn on_retry(mut self, f: impl Fn(u32, &ResilienceError, Duration) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(f));
        self
    }

    /// Called once with the attempts made and the final error
    pub fn on_failure(mut self, f: impl Fn(u32, &ResilienceError) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(f));
        self
    }

    /// Called once with the attempts made and the elapsed time
    pub fn on_success(mut self, f: impl Fn(u32, Duration) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for RetryHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHooks")
            .field("on_retry", &self.on_retry.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}

/// Runs an operation up to `max_attempts` times with backoff between attempts
#[derive(Debug)]
pub struct RetryHandler {
    name: String,
    config: RetryConfig,
    hooks: RetryHooks,
    stats: Mutex<RetryStats>,
    events: EventBus,
}

impl RetryHandler {
    /// Create a new retry handler publishing to `events`
    pub fn new(name: impl Into<String>, config: RetryConfig, events: EventBus) -> Self {
        Self {
            name: name.into(),
            config,
            hooks: RetryHooks::default(),
            stats: Mutex::new(RetryStats::default()),
            events,
        }
    }

    /// Handler with a private event bus, for one-off use
    pub fn standalone(config: RetryConfig) -> Self {
        Self::new("standalone", config, EventBus::new(1))
    }

    pub fn with_hooks(mut self, hooks: RetryHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn stats(&self) -> RetryStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = RetryStats::default();
    }

    /// Execute `operation` with retry logic.
    ///
    /// Attempts run strictly one after another; a non-retryable error aborts
    /// immediately whatever budget remains.
    pub async fn execute<F, Fut, T>(
        &self,
        mut operation: F,
        config_override: Option<&RetryConfig>,
    ) -> Result<RetryResult<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let config = config_override.unwrap_or(&self.config);
        let max_attempts = config.max_attempts.max(1);
        let started = Instant::now();
        let mut errors = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(result) => {
                    let total_time = started.elapsed();
                    self.record_success(attempt, total_time);
                    return Ok(RetryResult {
                        result,
                        attempts: attempt,
                        total_time,
                        errors,
                    });
                }
                Err(error) => error,
            };

            self.stats
                .lock()
                .error_counts
                .entry(error.name().to_string())
                .and_modify(|count| *count += 1)
                .or_insert(1);

            if !config.is_retryable(&error) {
                warn!(
                    "Retry handler '{}' aborting on non-retryable error at attempt {}: {}",
                    self.name, attempt, error
                );
                self.record_failure(attempt, started.elapsed(), &error);
                return Err(ResilienceError::NonRetryable {
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            if attempt >= max_attempts {
                error!(
                    "Retry handler '{}' failed after {} attempts: {}",
                    self.name, attempt, error
                );
                self.record_failure(attempt, started.elapsed(), &error);
                return Err(ResilienceError::RetryExhausted {
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            let delay = delay_for(config, attempt);
            debug!(
                "Attempt {} of '{}' failed: {}, retrying in {:?}",
                attempt, self.name, error, delay
            );
            if let Some(on_retry) = &self.hooks.on_retry {
                on_retry(attempt, &error, delay);
            }
            self.events.emit(ResilienceEvent::Retry {
                handler: self.name.clone(),
                attempt,
                delay_ms: delay.as_millis() as u64,
                error: error.to_string(),
            });
            self.stats.lock().total_retries += 1;
            errors.push(error);

            tokio::time::sleep(delay).await;
        }
    }

    fn record_success(&self, attempts: u32, elapsed: Duration) {
        {
            let mut stats = self.stats.lock();
            if attempts > 1 {
                stats.success_after_retry += 1;
            }
            stats.record_completion(attempts, elapsed);
        }
        if attempts > 1 {
            debug!("Retry succeeded on attempt {} for '{}'", attempts, self.name);
        }
        if let Some(on_success) = &self.hooks.on_success {
            on_success(attempts, elapsed);
        }
    }

    fn record_failure(&self, attempts: u32, elapsed: Duration, error: &ResilienceError) {
        {
            let mut stats = self.stats.lock();
            stats.ultimate_failures += 1;
            stats.record_completion(attempts, elapsed);
        }
        if let Some(on_failure) = &self.hooks.on_failure {
            on_failure(attempts, error);
        }
    }
}
