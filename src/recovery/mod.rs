//! Strategy-based error recovery for agents
//!
//! - `types` - Configuration, error contexts and statistics
//! - `strategies` - The [`RecoveryStrategy`] trait and built-in strategies
//! - `manager` - [`ErrorRecoveryManager`], one breaker per agent plus strategy selection
//! - `resilient_agent` - [`ResilientAgent`], inline retry in front of the manager

pub mod manager;
pub mod resilient_agent;
pub mod strategies;
pub mod types;

pub use manager::ErrorRecoveryManager;
pub use resilient_agent::ResilientAgent;
pub use strategies::{
    DependencyRecovery, ExponentialBackoffRetry, GracefulDegradation, RecoveryStrategy,
    ResourceCleanup, TimeoutRecovery, default_strategies,
};
pub use types::{ErrorContext, ErrorStats, RecoveryConfig, ResilientAgentConfig};
