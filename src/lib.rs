//! # agent-resilience
//!
//! Fault-tolerance core for autonomous worker agents. It decides, for any
//! asynchronous unit of work, whether to attempt it, how many times, with
//! what backoff, what to substitute when it cannot succeed, and how the
//! system as a whole sheds functionality under stress.
//!
//! ## Features
//!
//! - **Circuit breaking**: CLOSED / OPEN / HALF_OPEN breakers with a dual trip
//!   rule (absolute failures, or error rate above a volume floor)
//! - **Retry**: fixed, linear, exponential and jittered backoff with
//!   allow/deny classification of errors
//! - **Error recovery**: per-agent breakers and prioritized recovery
//!   strategies producing structured results instead of raw failures
//! - **Graceful degradation**: rule-driven service levels, feature flags,
//!   fallbacks and a response cache
//! - **Health monitoring**: periodic probes of registered agents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_resilience::breaker::{CircuitBreakerConfig, CircuitBreakerManager};
//! use agent_resilience::events::EventBus;
//! use agent_resilience::retry::{RetryConfig, RetryHandler};
//!
//! #[tokio::main]
//! async fn main() -> agent_resilience::Result<()> {
//!     let events = EventBus::default();
//!     let breakers = CircuitBreakerManager::new(CircuitBreakerConfig::default(), events.clone());
//!     let retry = RetryHandler::new("billing", RetryConfig::exponential_jitter(3), events);
//!
//!     let invoice = retry
//!         .execute(
//!             || breakers.execute("billing", || async { Ok("invoice-42") }, None),
//!             None,
//!         )
//!         .await?;
//!
//!     println!("{} after {} attempts", invoice.result, invoice.attempts);
//!     Ok(())
//! }
//! ```
//!
//! ## Agents
//!
//! ```rust,no_run
//! use agent_resilience::agent::{Agent, AgentResult, Task};
//! use agent_resilience::events::EventBus;
//! use agent_resilience::recovery::{ErrorRecoveryManager, RecoveryConfig, ResilientAgent};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Agent for Echo {
//!     fn id(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn execute(&self, task: &Task) -> agent_resilience::Result<AgentResult> {
//!         Ok(AgentResult::success("echo", &task.id, task.payload.clone()))
//!     }
//! }
//!
//! # async fn run() -> agent_resilience::Result<()> {
//! let recovery = Arc::new(ErrorRecoveryManager::new(RecoveryConfig::default(), EventBus::default()));
//! let agent = ResilientAgent::with_defaults(Arc::new(Echo), recovery);
//! let result = agent.execute(&Task::new("greet")).await?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod agent;
pub mod breaker;
pub mod config;
pub mod degradation;
pub mod error;
pub mod events;
pub mod health;
pub mod logging;
pub mod protect;
pub mod recovery;
pub mod retry;

// Re-export main types
pub use agent::{Agent, AgentResult, Task};
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitState};
pub use config::ResilienceConfig;
pub use degradation::{DegradationLevel, GracefulDegradationManager};
pub use error::{ResilienceError, Result};
pub use events::{EventBus, ResilienceEvent};
pub use health::{HealthStatus, SystemHealthMonitor};
pub use protect::Protection;
pub use recovery::{ErrorRecoveryManager, ResilientAgent};
pub use retry::{RetryConfig, RetryHandler, RetryManager};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
