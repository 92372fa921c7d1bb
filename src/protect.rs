//! Explicit protection wrappers
//!
//! [`Protection`] composes a deadline, a circuit breaker and a retry handler
//! around an operation. Composition order is fixed: retry is outermost, each
//! attempt passes through the breaker, and the deadline bounds a single
//! attempt.
//!
//! ```rust,no_run
//! use agent_resilience::breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use agent_resilience::events::EventBus;
//! use agent_resilience::protect::Protection;
//! use agent_resilience::retry::{RetryConfig, RetryHandler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> agent_resilience::error::Result<()> {
//! let events = EventBus::default();
//! let fetch = Protection::new()
//!     .with_circuit_breaker(Arc::new(CircuitBreaker::new(
//!         CircuitBreakerConfig::named("inventory"),
//!         events.clone(),
//!     )))
//!     .with_retry(Arc::new(RetryHandler::new("inventory", RetryConfig::default(), events)))
//!     .with_timeout(Duration::from_secs(2))
//!     .wrap(|sku: String| async move { Ok(format!("stock for {sku}")) });
//!
//! let stock = fetch("A-1".to_string()).await?;
//! # Ok(())
//! # }
//! ```

use crate::breaker::CircuitBreaker;
use crate::error::{ResilienceError, Result};
use crate::retry::RetryHandler;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builder for a protected call path
#[derive(Debug, Clone, Default)]
pub struct Protection {
    breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<Arc<RetryHandler>>,
    timeout: Option<Duration>,
}

impl Protection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn with_retry(mut self, retry: Arc<RetryHandler>) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Deadline for each attempt. With a breaker attached this overrides the
    /// breaker's own call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    pub fn retry(&self) -> Option<&Arc<RetryHandler>> {
        self.retry.as_ref()
    }

    /// Run `operation` under every configured layer
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match &self.retry {
            Some(retry) => retry
                .execute(|| self.attempt(operation()), None)
                .await
                .map(|outcome| outcome.result),
            None => self.attempt(operation()).await,
        }
    }

    async fn attempt<Fut, T>(&self, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match (&self.breaker, self.timeout) {
            (Some(breaker), timeout) => breaker.execute(|| call, timeout).await,
            (None, Some(timeout)) => match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Protected operation exceeded {:?}", timeout);
                    Err(ResilienceError::timeout(format!(
                        "Operation timed out after {timeout:?}"
                    )))
                }
            },
            (None, None) => call.await,
        }
    }

    /// Wrap `operation` into a callable taking the same argument and
    /// returning the same result, protected by this configuration
    pub fn wrap<A, F, Fut, T>(self, operation: F) -> impl Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync + 'static
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let protection = Arc::new(self);
        let operation = Arc::new(operation);
        move |args: A| {
            let protection = Arc::clone(&protection);
            let operation = Arc::clone(&operation);
            Box::pin(async move { protection.run(|| operation(args.clone())).await })
        }
    }
}
