//! Registry of named retry handlers and convenience entry points

use super::handler::RetryHandler;
use super::types::{RetryConfig, RetryStats};
use crate::error::Result;
use crate::events::EventBus;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Name-keyed registry of retry handlers
#[derive(Debug)]
pub struct RetryManager {
    defaults: RetryConfig,
    handlers: DashMap<String, Arc<RetryHandler>>,
    events: EventBus,
}

impl RetryManager {
    pub fn new(defaults: RetryConfig, events: EventBus) -> Self {
        Self {
            defaults,
            handlers: DashMap::new(),
            events,
        }
    }

    /// Handler for `name`, created with `config` (or the defaults) on first use
    pub fn get_or_create(&self, name: &str, config: Option<RetryConfig>) -> Arc<RetryHandler> {
        if let Some(existing) = self.handlers.get(name) {
            return existing.clone();
        }
        self.handlers
            .entry(name.to_string())
            .or_insert_with(|| {
                info!("Registered retry handler '{}'", name);
                Arc::new(RetryHandler::new(
                    name,
                    config.unwrap_or_else(|| self.defaults.clone()),
                    self.events.clone(),
                ))
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<RetryHandler>> {
        self.handlers.get(name).map(|h| h.clone())
    }

    /// Run `operation` through the handler named `name`, returning the value
    pub async fn execute<F, Fut, T>(&self, name: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let handler = self.get_or_create(name, None);
        handler.execute(operation, None).await.map(|r| r.result)
    }

    pub fn all_stats(&self) -> HashMap<String, RetryStats> {
        self.handlers
            .iter()
            .map(|e| (e.key().clone(), e.value().stats()))
            .collect()
    }

    pub fn reset_stats(&self) {
        for entry in self.handlers.iter() {
            entry.value().reset_stats();
        }
    }
}

/// Retry with exponential backoff plus jitter and default delays
pub async fn retry_exponential_jitter<F, Fut, T>(operation: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryHandler::standalone(RetryConfig::exponential_jitter(max_attempts))
        .execute(operation, None)
        .await
        .map(|r| r.result)
}

/// Retry with a delay growing linearly by `delay`
pub async fn retry_linear<F, Fut, T>(operation: F, max_attempts: u32, delay: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryHandler::standalone(RetryConfig::linear(max_attempts, delay))
        .execute(operation, None)
        .await
        .map(|r| r.result)
}

/// Retry with a constant `delay`
pub async fn retry_fixed<F, Fut, T>(operation: F, max_attempts: u32, delay: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryHandler::standalone(RetryConfig::fixed(max_attempts, delay))
        .execute(operation, None)
        .await
        .map(|r| r.result)
}
