//! Agent health monitoring
//!
//! - `types` - Health status levels, check results and per-agent tracking
//! - `monitor` - Periodic prober sending each agent a synthetic health task

pub mod monitor;
pub mod types;

pub use monitor::{HealthMonitorConfig, SystemHealthMonitor};
pub use types::{AgentHealth, HealthCheckResult, HealthStatus, SystemHealthReport};
