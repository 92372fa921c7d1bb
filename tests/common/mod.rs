//! Common test utilities for agent-resilience
//!
//! - Scripted agents whose failures are controlled per call
//! - Configuration fixtures with short delays and low thresholds
//! - Custom assertions

pub mod agents;
pub mod assertions;
pub mod fixtures;

// Re-export commonly used items
pub use agents::{FlakyAgent, SlowAgent};
pub use fixtures::{ConfigFactory, MetricsFactory};
