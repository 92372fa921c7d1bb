//! Generic breaker state machine
//!
//! [`BreakerCore`] owns the CLOSED / OPEN / HALF_OPEN lifecycle once, for every
//! call site. What differs between call sites is the [`TripPolicy`]: the named
//! [`super::CircuitBreaker`] trips on an absolute count or a windowed error
//! rate, while per-agent breakers trip on the absolute count alone.
//!
//! State lives behind a mutex so transitions are atomic with respect to
//! concurrent callers; every mutating method returns the [`Transition`] it
//! caused (if any) so the owner can publish it.

use super::types::{CircuitBreakerConfig, CircuitState};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Request/failure counts of the current rolling window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub requests: u64,
    pub failures: u64,
}

/// Decides when a closed breaker opens and how it recovers
pub trait TripPolicy: Send + Sync {
    /// Whether a closed breaker should open after a failure.
    ///
    /// `failure_count` already includes the failure being recorded.
    fn should_trip(&self, failure_count: u32, window: WindowCounts) -> bool;

    /// Successes needed while half-open to close
    fn success_threshold(&self) -> u32;

    /// Time spent open before a probe is admitted
    fn recovery_timeout(&self) -> Duration;
}

/// Dual trip rule: absolute failure count, or error rate once the window has
/// enough volume
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
    pub volume_threshold: u64,
    pub error_threshold: f64,
}

impl From<&CircuitBreakerConfig> for ThresholdPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            recovery_timeout: config.recovery_timeout(),
            volume_threshold: config.volume_threshold,
            error_threshold: config.error_threshold,
        }
    }
}

impl TripPolicy for ThresholdPolicy {
    fn should_trip(&self, failure_count: u32, window: WindowCounts) -> bool {
        if failure_count >= self.failure_threshold {
            return true;
        }
        window.requests > 0
            && window.requests >= self.volume_threshold
            && window.failures as f64 / window.requests as f64 >= self.error_threshold
    }

    fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }
}

/// Absolute-count rule used for per-agent breakers
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTripPolicy {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_time: Duration,
}

impl TripPolicy for AgentTripPolicy {
    fn should_trip(&self, failure_count: u32, _window: WindowCounts) -> bool {
        failure_count >= self.failure_threshold
    }

    fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    fn recovery_timeout(&self) -> Duration {
        self.recovery_time
    }
}

/// Outcome of asking a breaker for admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed or half-open, call proceeds
    Allowed,
    /// Recovery window elapsed, breaker moved to half-open for this call
    Probe,
    /// Open, the call must not run
    Rejected { retry_after: Duration },
}

/// A state change caused by a breaker method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Copy of the breaker state at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub next_attempt_in: Option<Duration>,
}

#[derive(Debug)]
struct CoreState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    last_success_time: Option<DateTime<Utc>>,
    next_attempt: Option<Instant>,
}

impl CoreState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            last_success_time: None,
            next_attempt: None,
        }
    }

    fn move_to(&mut self, to: CircuitState) -> Option<Transition> {
        let from = self.state;
        self.state = to;
        (from != to).then_some(Transition { from, to })
    }
}

/// Breaker state machine parameterised by a trip policy
#[derive(Debug)]
pub struct BreakerCore<P> {
    policy: P,
    inner: Mutex<CoreState>,
}

impl<P: TripPolicy> BreakerCore<P> {
    /// Create a closed breaker
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            inner: Mutex::new(CoreState::closed()),
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Decide whether a call may run; moves OPEN to HALF_OPEN once the
    /// recovery window has elapsed
    pub fn admit(&self) -> (Admission, Option<Transition>) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => (Admission::Allowed, None),
            CircuitState::Open => {
                let now = Instant::now();
                match inner.next_attempt {
                    Some(next) if now < next => (
                        Admission::Rejected {
                            retry_after: next - now,
                        },
                        None,
                    ),
                    _ => {
                        inner.success_count = 0;
                        inner.next_attempt = None;
                        let transition = inner.move_to(CircuitState::HalfOpen);
                        (Admission::Probe, transition)
                    }
                }
            }
        }
    }

    /// Record a successful call
    pub fn on_success(&self) -> Option<Transition> {
        let mut inner = self.inner.lock();
        inner.last_success_time = Some(Utc::now());
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.policy.success_threshold() {
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.next_attempt = None;
                    inner.move_to(CircuitState::Closed)
                } else {
                    None
                }
            }
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
                None
            }
            // A call admitted before the circuit opened finished late
            CircuitState::Open => None,
        }
    }

    /// Record a failed call; `window` feeds rate-based trip rules
    pub fn on_failure(&self, window: WindowCounts) -> Option<Transition> {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(Utc::now());
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                inner.next_attempt = Some(Instant::now() + self.policy.recovery_timeout());
                inner.move_to(CircuitState::Open)
            }
            CircuitState::Closed if self.policy.should_trip(inner.failure_count, window) => {
                inner.next_attempt = Some(Instant::now() + self.policy.recovery_timeout());
                inner.move_to(CircuitState::Open)
            }
            _ => None,
        }
    }

    /// Open immediately, regardless of counters
    pub fn force_open(&self) -> Option<Transition> {
        let mut inner = self.inner.lock();
        inner.success_count = 0;
        inner.next_attempt = Some(Instant::now() + self.policy.recovery_timeout());
        inner.move_to(CircuitState::Open)
    }

    /// Close immediately and clear counters
    pub fn force_close(&self) -> Option<Transition> {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.next_attempt = None;
        inner.move_to(CircuitState::Closed)
    }

    /// Return to a pristine closed state, forgetting timestamps too
    pub fn reset(&self) -> Option<Transition> {
        let mut inner = self.inner.lock();
        let from = inner.state;
        *inner = CoreState::closed();
        (from != CircuitState::Closed).then_some(Transition {
            from,
            to: CircuitState::Closed,
        })
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let now = Instant::now();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            next_attempt_in: inner
                .next_attempt
                .filter(|_| inner.state == CircuitState::Open)
                .map(|next| next.saturating_duration_since(now)),
        }
    }
}

/// Breakers created on demand per key, all sharing one policy template
#[derive(Debug)]
pub struct KeyedBreakers<K, P>
where
    K: Eq + Hash,
{
    policy: P,
    breakers: DashMap<K, Arc<BreakerCore<P>>>,
}

impl<K, P> KeyedBreakers<K, P>
where
    K: Eq + Hash + Clone,
    P: TripPolicy + Clone,
{
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            breakers: DashMap::new(),
        }
    }

    /// Breaker for `key`, created closed on first use
    pub fn get(&self, key: &K) -> Arc<BreakerCore<P>> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.clone();
        }
        self.breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(BreakerCore::new(self.policy.clone())))
            .clone()
    }

    /// State for `key`; unknown keys are closed
    pub fn state(&self, key: &K) -> CircuitState {
        self.breakers
            .get(key)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    pub fn snapshot(&self, key: &K) -> Option<BreakerSnapshot> {
        self.breakers.get(key).map(|b| b.snapshot())
    }

    /// Forget the breaker for `key`
    pub fn reset(&self, key: &K) -> bool {
        self.breakers.remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<K> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AgentTripPolicy {
        AgentTripPolicy {
            failure_threshold: 2,
            success_threshold: 1,
            recovery_time: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_core_lifecycle() {
        let core = BreakerCore::new(policy());
        assert_eq!(core.on_failure(WindowCounts::default()), None);
        assert_eq!(
            core.on_failure(WindowCounts::default()),
            Some(Transition {
                from: CircuitState::Closed,
                to: CircuitState::Open
            })
        );

        let (admission, _) = core.admit();
        assert!(matches!(admission, Admission::Rejected { .. }));

        tokio::time::advance(Duration::from_millis(150)).await;
        let (admission, transition) = core.admit();
        assert_eq!(admission, Admission::Probe);
        assert_eq!(transition.map(|t| t.to), Some(CircuitState::HalfOpen));

        assert_eq!(core.on_success().map(|t| t.to), Some(CircuitState::Closed));
        assert_eq!(core.snapshot().failure_count, 0);
    }

    #[test]
    fn test_success_decays_failure_count() {
        let core = BreakerCore::new(AgentTripPolicy {
            failure_threshold: 10,
            ..policy()
        });
        core.on_failure(WindowCounts::default());
        core.on_failure(WindowCounts::default());
        core.on_success();
        assert_eq!(core.snapshot().failure_count, 1);
        core.on_success();
        core.on_success();
        assert_eq!(core.snapshot().failure_count, 0);
    }

    #[test]
    fn test_threshold_policy_rate_rule() {
        let policy = ThresholdPolicy {
            failure_threshold: 100,
            success_threshold: 1,
            recovery_timeout: Duration::from_secs(1),
            volume_threshold: 10,
            error_threshold: 0.5,
        };
        // Below volume: rate alone never trips
        assert!(!policy.should_trip(
            5,
            WindowCounts {
                requests: 9,
                failures: 9
            }
        ));
        assert!(policy.should_trip(
            5,
            WindowCounts {
                requests: 10,
                failures: 5
            }
        ));
        assert!(!policy.should_trip(
            4,
            WindowCounts {
                requests: 10,
                failures: 4
            }
        ));
    }

    #[test]
    fn test_keyed_breakers_are_independent() {
        let breakers: KeyedBreakers<String, AgentTripPolicy> = KeyedBreakers::new(policy());
        let a = "agent-a".to_string();
        let b = "agent-b".to_string();

        breakers.get(&a).on_failure(WindowCounts::default());
        breakers.get(&a).on_failure(WindowCounts::default());

        assert_eq!(breakers.state(&a), CircuitState::Open);
        assert_eq!(breakers.state(&b), CircuitState::Closed);
        assert_eq!(breakers.len(), 1);

        assert!(breakers.reset(&a));
        assert_eq!(breakers.state(&a), CircuitState::Closed);
    }

    #[test]
    fn test_force_and_reset() {
        let core = BreakerCore::new(policy());
        assert_eq!(core.force_open().map(|t| t.to), Some(CircuitState::Open));
        assert!(core.snapshot().next_attempt_in.is_some());
        assert_eq!(core.force_close().map(|t| t.to), Some(CircuitState::Closed));
        assert_eq!(core.reset(), None);
    }
}
