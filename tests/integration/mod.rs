//! Integration tests for agent-resilience
//!
//! These tests verify the interaction between multiple components
//! and exercise real timing through Tokio's paused clock.

pub mod breaker_retry_tests;
pub mod config_tests;
pub mod degradation_tests;
pub mod recovery_pipeline_tests;
