//! Circuit breaking for named operations and keyed actors
//!
//! This module provides a single breaker state machine ([`core::BreakerCore`])
//! parameterised by a [`core::TripPolicy`], the full named [`CircuitBreaker`]
//! built on top of it, and the [`CircuitBreakerManager`] registry.
//!
//! # Module Structure
//!
//! - `types` - Breaker states, configuration and metrics
//! - `core` - Generic state machine and keyed registry
//! - `circuit_breaker` - Named breaker with timeout race and rolling metrics
//! - `manager` - Name-keyed registry and aggregate health

mod circuit_breaker;
pub mod core;
mod manager;
mod types;

pub use self::core::{
    Admission, AgentTripPolicy, BreakerCore, BreakerSnapshot, KeyedBreakers, ThresholdPolicy,
    Transition, TripPolicy, WindowCounts,
};
pub use circuit_breaker::CircuitBreaker;
pub use manager::{BreakerHealthReport, CircuitBreakerManager};
pub use types::{BreakerOverrides, CircuitBreakerConfig, CircuitBreakerStats, CircuitMetrics, CircuitState};
