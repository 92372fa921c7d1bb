//! Backoff delay computation

use super::types::{BackoffStrategy, RetryConfig};
use rand::Rng;
use std::time::Duration;

/// Delay after failed `attempt` (1-based) before any jitter, clipped to the
/// maximum delay
pub fn base_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let initial = config.initial_delay_ms as f64;
    let attempt = attempt.max(1);
    let millis = match config.strategy {
        BackoffStrategy::Fixed => initial,
        BackoffStrategy::Linear => initial * attempt as f64 * config.multiplier,
        BackoffStrategy::Exponential | BackoffStrategy::ExponentialJitter => {
            initial * config.multiplier.powi(attempt as i32 - 1)
        }
    };
    clip(millis, config.max_delay_ms)
}

/// Delay to wait after failed `attempt`, jitter included
pub fn delay_for(config: &RetryConfig, attempt: u32) -> Duration {
    let base = base_delay(config, attempt);
    if config.strategy != BackoffStrategy::ExponentialJitter || config.jitter_max_ms == 0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0..=config.jitter_max_ms);
    clip(base.as_millis() as f64 + jitter as f64, config.max_delay_ms)
}

fn clip(millis: f64, max_delay_ms: u64) -> Duration {
    if !millis.is_finite() || millis >= max_delay_ms as f64 {
        Duration::from_millis(max_delay_ms)
    } else {
        Duration::from_millis(millis.max(0.0) as u64)
    }
}
