//! Graceful degradation
//!
//! This module moves the whole system through ordered service levels
//! (full, partial, minimal, emergency) as rules evaluated against live
//! metrics fire and recover, and substitutes fallbacks for services that
//! are disabled or failing.
//!
//! # Module Structure
//!
//! - `types` - Levels, metrics snapshots, state and configuration
//! - `rules` - Triggers, actions and rule recovery conditions
//! - `fallback` - Fallback handlers and strategies
//! - `metrics` - Request windows, host sampling and the metrics collector
//! - `manager` - [`GracefulDegradationManager`]

pub mod fallback;
pub mod manager;
pub mod metrics;
pub mod rules;
pub mod types;

pub use fallback::{FallbackHandler, FallbackReason, FallbackRequest, FallbackStrategy, StaticFallback};
pub use manager::GracefulDegradationManager;
pub use metrics::{
    MetricsCollector, RequestMetrics, RequestSnapshot, ResourceSampler, SystemMetricsCollector,
};
pub use rules::{Action, DegradationRule, MetricsPredicate, Resource, Trigger};
pub use types::{
    DegradationConfig, DegradationLevel, DegradationState, LevelChange, ResourceUsage,
    ResponseTimes, SystemMetrics,
};
