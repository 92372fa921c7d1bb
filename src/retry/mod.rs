//! Retry with configurable backoff
//!
//! This module provides the [`RetryHandler`] that re-runs a failing operation
//! according to a [`RetryConfig`], a [`RetryManager`] registry of named
//! handlers, and convenience entry points for common strategies.

mod backoff;
mod handler;
mod manager;
#[cfg(test)]
mod tests;
mod types;

pub use backoff::{base_delay, delay_for};
pub use handler::{RetryHandler, RetryHooks};
pub use manager::{RetryManager, retry_exponential_jitter, retry_fixed, retry_linear};
pub use types::{BackoffStrategy, RetryConfig, RetryResult, RetryStats};
