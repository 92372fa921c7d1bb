//! Custom test assertions
//!
//! Provides domain-specific assertions for agent results.

use agent_resilience::agent::AgentResult;

/// Assertions for AgentResult
pub trait AgentResultAssertions {
    /// Assert the result succeeded through the named recovery strategy
    fn assert_recovered_by(&self, strategy: &str);

    /// Assert the result failed with an error containing `fragment`
    fn assert_failed_with(&self, fragment: &str);
}

impl AgentResultAssertions for AgentResult {
    fn assert_recovered_by(&self, strategy: &str) {
        assert!(self.success, "Expected success, got error {:?}", self.error);
        assert_eq!(
            self.recovered_by.as_deref(),
            Some(strategy),
            "Expected recovery by {strategy}"
        );
    }

    fn assert_failed_with(&self, fragment: &str) {
        assert!(!self.success, "Expected failure, got {:?}", self.output);
        let error = self.error.as_deref().unwrap_or_default();
        assert!(
            error.contains(fragment),
            "Expected error containing {fragment:?}, got {error:?}"
        );
    }
}

/// Assert two values are approximately equal (for floats)
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_approx_eq!($left, $right, 1e-6_f64)
    };
    ($left:expr, $right:expr, $epsilon:expr) => {
        let left_val: f64 = $left as f64;
        let right_val: f64 = $right as f64;
        let diff = (left_val - right_val).abs();
        assert!(
            diff < $epsilon,
            "assertion failed: `(left ~ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` (epsilon: `{:?}`)",
            left_val,
            right_val,
            diff,
            $epsilon
        );
    };
}
