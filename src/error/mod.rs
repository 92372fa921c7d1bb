//! Error handling for the resilience core
//!
//! This module defines all error types produced by the protection layers.

mod conversions;
mod helpers;
mod types;

pub use types::{CircuitBreakerError, ResilienceError, Result};
