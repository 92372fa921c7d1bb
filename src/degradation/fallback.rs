//! Fallback strategies substituted for unavailable services

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Why a fallback is being used
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The service feature is disabled
    ServiceDisabled,
    /// The system is in emergency mode
    EmergencyMode,
    /// The primary operation failed
    OperationFailed { error: String },
}

/// Context handed to a fallback in place of the original call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackRequest {
    pub service: String,
    pub reason: FallbackReason,
}

/// Produces a substitute response
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    async fn execute(&self, request: &FallbackRequest) -> Result<Value>;
}

/// Returns a fixed value, useful for "service unavailable" placeholders
#[derive(Debug, Clone)]
pub struct StaticFallback {
    pub value: Value,
}

#[async_trait]
impl FallbackHandler for StaticFallback {
    async fn execute(&self, _request: &FallbackRequest) -> Result<Value> {
        Ok(self.value.clone())
    }
}

struct FnFallback<F>(F);

#[async_trait]
impl<F> FallbackHandler for FnFallback<F>
where
    F: Fn(&FallbackRequest) -> Result<Value> + Send + Sync,
{
    async fn execute(&self, request: &FallbackRequest) -> Result<Value> {
        (self.0)(request)
    }
}

/// A registered alternate implementation for one service
#[derive(Clone)]
pub struct FallbackStrategy {
    pub id: String,
    pub name: String,
    pub service: String,
    /// Higher values are preferred
    pub priority: i32,
    handler: Arc<dyn FallbackHandler>,
}

impl std::fmt::Debug for FallbackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackStrategy")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("service", &self.service)
            .field("priority", &self.priority)
            .finish()
    }
}

impl FallbackStrategy {
    pub fn new(
        id: impl Into<String>,
        service: impl Into<String>,
        priority: i32,
        handler: Arc<dyn FallbackHandler>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            service: service.into(),
            priority,
            handler,
        }
    }

    /// Fallback answering with a fixed value
    pub fn fixed(id: impl Into<String>, service: impl Into<String>, priority: i32, value: Value) -> Self {
        Self::new(id, service, priority, Arc::new(StaticFallback { value }))
    }

    /// Fallback computed synchronously from the request
    pub fn from_fn<F>(id: impl Into<String>, service: impl Into<String>, priority: i32, f: F) -> Self
    where
        F: Fn(&FallbackRequest) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(id, service, priority, Arc::new(FnFallback(f)))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub async fn execute(&self, request: &FallbackRequest) -> Result<Value> {
        self.handler.execute(request).await
    }
}
