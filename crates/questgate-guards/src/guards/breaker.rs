//! Circuit breaker registry
//!
//! One breaker per configured feature, each tracking a rolling error ratio:
//!
//! - **Closed**: requests pass. Outcomes accumulate in the current window.
//! - **Open**: requests are refused until the recovery timeout has elapsed
//!   since the last failure; the first check after that moves to half-open.
//! - **HalfOpen**: trial requests pass. A success closes the breaker and zeroes the
//!   counters. A failure goes through the normal trip condition, so a
//!   low-threshold breaker can stay half-open across several failed trial requests.
//!
//! Window reset happens only on `check`: once the observation window has been
//! exceeded the counters restart from zero. The trip condition is evaluated on
//! every recorded failure: `requests >= min_requests` and
//! `failures / requests >= threshold`.
//!
//! The registry is an owned value, not a process global. Each feature has its
//! own lock, so different features never contend.

use parking_lot::Mutex;
use questgate_core::{
    BreakerConfig, FeatureId, GateConfig, PhysicalTime, PhysicalTimeEffects,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error rate above which the status surface reports a feature as having issues
pub const ISSUE_ERROR_RATE: f64 = 0.03;

/// Breaker state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation
    #[default]
    Closed,
    /// Failing fast
    Open,
    /// Letting trial requests through
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// Mutable state of one breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerState {
    /// Current position
    pub state: CircuitState,
    /// Failures in the current window
    pub failure_count: u32,
    /// Requests in the current window
    pub request_count: u32,
    /// Time of the most recent failure
    pub last_failure: Option<PhysicalTime>,
    /// Transitions into OPEN since the breaker was created or reset
    pub times_opened: u32,
    /// Start of the current observation window
    pub window_start: PhysicalTime,
}

impl BreakerState {
    fn new(now: PhysicalTime) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            request_count: 0,
            last_failure: None,
            times_opened: 0,
            window_start: now,
        }
    }

    fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            f64::from(self.failure_count) / f64::from(self.request_count)
        }
    }
}

/// Point-in-time view of one breaker for the status surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    /// Feature
    pub feature: FeatureId,
    /// Current position
    pub state: CircuitState,
    /// Failures in the current window
    pub failure_count: u32,
    /// Requests in the current window
    pub request_count: u32,
    /// failures / requests, zero without requests
    pub error_rate: f64,
}

impl BreakerSnapshot {
    /// Error rate above [`ISSUE_ERROR_RATE`] or breaker not closed
    pub fn has_issues(&self) -> bool {
        self.error_rate > ISSUE_ERROR_RATE || self.state != CircuitState::Closed
    }
}

struct BreakerSlot {
    config: BreakerConfig,
    state: Mutex<Option<BreakerState>>,
}

/// Per-feature circuit breakers
pub struct BreakerRegistry {
    slots: HashMap<FeatureId, BreakerSlot>,
    time: Arc<dyn PhysicalTimeEffects>,
}

impl fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("features", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl BreakerRegistry {
    /// Create a registry; features without a configuration are never protected
    pub fn new(
        configs: BTreeMap<FeatureId, BreakerConfig>,
        time: Arc<dyn PhysicalTimeEffects>,
    ) -> Self {
        let slots = configs
            .into_iter()
            .map(|(feature, config)| {
                (
                    feature,
                    BreakerSlot {
                        config,
                        state: Mutex::new(None),
                    },
                )
            })
            .collect();
        Self { slots, time }
    }

    /// Build from startup configuration
    pub fn from_config(config: &GateConfig, time: Arc<dyn PhysicalTimeEffects>) -> Self {
        Self::new(config.breakers.clone(), time)
    }

    /// Configuration for a feature, if it is protected
    pub fn config_for(&self, feature: FeatureId) -> Option<&BreakerConfig> {
        self.slots.get(&feature).map(|slot| &slot.config)
    }

    /// Whether the breaker currently lets a request through
    pub fn check_breaker(&self, feature: FeatureId) -> bool {
        let Some(slot) = self.slots.get(&feature) else {
            return true;
        };
        let now = self.time.physical_time();
        let mut guard = slot.state.lock();
        let state = guard.get_or_insert_with(|| BreakerState::new(now));

        if now.saturating_since(state.window_start) > slot.config.observation_window() {
            debug!(feature = %feature, "Breaker observation window expired, resetting counters");
            state.failure_count = 0;
            state.request_count = 0;
            state.window_start = now;
        }

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = state
                    .last_failure
                    .map_or(true, |at| now.saturating_since(at) >= slot.config.recovery_timeout());
                if recovered {
                    state.state = CircuitState::HalfOpen;
                    info!(feature = %feature, "Circuit breaker HALF_OPEN: allowing trial requests");
                }
                recovered
            }
        }
    }

    /// Feed the outcome of a real invocation into the breaker
    pub fn record_result(&self, feature: FeatureId, success: bool) {
        let Some(slot) = self.slots.get(&feature) else {
            return;
        };
        let now = self.time.physical_time();
        let mut guard = slot.state.lock();
        let state = guard.get_or_insert_with(|| BreakerState::new(now));

        state.request_count = state.request_count.saturating_add(1);

        if success {
            if state.state == CircuitState::HalfOpen {
                state.state = CircuitState::Closed;
                state.failure_count = 0;
                state.request_count = 0;
                info!(feature = %feature, "Circuit breaker CLOSED: recovery successful");
            }
            return;
        }

        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(now);

        if state.request_count >= slot.config.min_requests_before_evaluation {
            let error_rate = state.error_rate();
            if error_rate >= slot.config.error_threshold_ratio && state.state != CircuitState::Open {
                let previous = state.state;
                state.state = CircuitState::Open;
                state.times_opened = state.times_opened.saturating_add(1);
                warn!(
                    feature = %feature,
                    from = %previous,
                    error_rate,
                    failures = state.failure_count,
                    requests = state.request_count,
                    "Circuit breaker OPEN"
                );
            }
        }
    }

    /// Current position of a feature's breaker; `None` when unprotected
    pub fn state_of(&self, feature: FeatureId) -> Option<CircuitState> {
        let slot = self.slots.get(&feature)?;
        let guard = slot.state.lock();
        Some(guard.as_ref().map_or(CircuitState::Closed, |state| state.state))
    }

    /// Copy of a feature's full breaker state, if it has been touched
    pub fn state_details(&self, feature: FeatureId) -> Option<BreakerState> {
        self.slots.get(&feature)?.state.lock().clone()
    }

    /// Operator reset to closed with zeroed counters
    pub fn reset(&self, feature: FeatureId) {
        if let Some(slot) = self.slots.get(&feature) {
            let now = self.time.physical_time();
            *slot.state.lock() = Some(BreakerState::new(now));
            info!(feature = %feature, "Circuit breaker reset by operator");
        }
    }

    /// Snapshot of every protected feature, in catalogue order
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .slots
            .iter()
            .map(|(feature, slot)| {
                let guard = slot.state.lock();
                match guard.as_ref() {
                    Some(state) => BreakerSnapshot {
                        feature: *feature,
                        state: state.state,
                        failure_count: state.failure_count,
                        request_count: state.request_count,
                        error_rate: state.error_rate(),
                    },
                    None => BreakerSnapshot {
                        feature: *feature,
                        state: CircuitState::Closed,
                        failure_count: 0,
                        request_count: 0,
                        error_rate: 0.0,
                    },
                }
            })
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.feature);
        snapshots
    }

    /// Number of features the status surface should flag
    pub fn features_with_issues(&self) -> usize {
        self.snapshot().iter().filter(|s| s.has_issues()).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use questgate_core::SimulatedTimeHandler;
    use std::thread;

    fn registry() -> (BreakerRegistry, SimulatedTimeHandler) {
        let clock = SimulatedTimeHandler::default();
        let registry = BreakerRegistry::from_config(&GateConfig::defaults(), Arc::new(clock.clone()));
        (registry, clock)
    }

    #[test]
    fn starts_closed() {
        let (registry, _) = registry();
        assert!(registry.check_breaker(FeatureId::AiCodingAssistant));
        assert_eq!(
            registry.state_of(FeatureId::AiCodingAssistant),
            Some(CircuitState::Closed)
        );
    }

    #[test]
    fn unconfigured_feature_always_passes() {
        let clock = SimulatedTimeHandler::default();
        let registry = BreakerRegistry::new(BTreeMap::new(), Arc::new(clock));
        for _ in 0..50 {
            registry.record_result(FeatureId::CodingHints, false);
        }
        assert!(registry.check_breaker(FeatureId::CodingHints));
        assert_eq!(registry.state_of(FeatureId::CodingHints), None);
    }

    #[test]
    fn consecutive_failures_trip_the_breaker() {
        let (registry, _) = registry();
        let feature = FeatureId::AiCodingAssistant; // 5%, min 10
        for _ in 0..9 {
            registry.record_result(feature, false);
        }
        assert!(registry.check_breaker(feature), "below min requests");
        registry.record_result(feature, false);
        assert!(!registry.check_breaker(feature));
        assert_eq!(registry.state_of(feature), Some(CircuitState::Open));
    }

    #[test]
    fn one_early_failure_in_twenty_does_not_trip() {
        let (registry, _) = registry();
        let feature = FeatureId::AiCodingAssistant;
        for i in 0..20 {
            registry.record_result(feature, i != 0);
        }
        assert!(registry.check_breaker(feature));
        assert_eq!(registry.state_of(feature), Some(CircuitState::Closed));
    }

    #[test]
    fn ratio_exactly_at_threshold_trips() {
        let (registry, _) = registry();
        let feature = FeatureId::AiCodingAssistant; // 5%
        for _ in 0..19 {
            registry.record_result(feature, true);
        }
        registry.record_result(feature, false); // 1 / 20 == 0.05
        assert_eq!(registry.state_of(feature), Some(CircuitState::Open));
    }

    #[test]
    fn open_until_recovery_timeout_then_half_open() {
        let (registry, clock) = registry();
        let feature = FeatureId::AiCodingAssistant; // recovery 60s
        for _ in 0..10 {
            registry.record_result(feature, false);
        }
        clock.advance_secs(59);
        assert!(!registry.check_breaker(feature));
        clock.advance_secs(1);
        assert!(registry.check_breaker(feature));
        assert_eq!(registry.state_of(feature), Some(CircuitState::HalfOpen));
        assert!(registry.check_breaker(feature), "half-open keeps allowing trial requests");
    }

    #[test]
    fn half_open_success_closes_and_zeroes_counters() {
        let (registry, clock) = registry();
        let feature = FeatureId::AiCodingAssistant;
        for _ in 0..10 {
            registry.record_result(feature, false);
        }
        clock.advance_secs(60);
        assert!(registry.check_breaker(feature));
        registry.record_result(feature, true);

        let state = registry.state_details(feature).unwrap();
        assert_eq!(state.state, CircuitState::Closed);
        assert_eq!(state.failure_count, 0);
        assert_eq!(state.request_count, 0);
    }

    #[test]
    fn half_open_failure_retrips_through_trip_condition() {
        let (registry, clock) = registry();
        let feature = FeatureId::AiCodingAssistant;
        for _ in 0..10 {
            registry.record_result(feature, false);
        }
        clock.advance_secs(60);
        assert!(registry.check_breaker(feature));
        registry.record_result(feature, false);
        assert_eq!(registry.state_of(feature), Some(CircuitState::Open));
    }

    #[test]
    fn half_open_failure_after_window_reset_needs_min_requests() {
        let (registry, clock) = registry();
        let feature = FeatureId::AiCodingAssistant; // window 300s, min 10
        for _ in 0..10 {
            registry.record_result(feature, false);
        }
        // Past both the recovery timeout and the observation window.
        clock.advance_secs(301);
        assert!(registry.check_breaker(feature));
        assert_eq!(registry.state_of(feature), Some(CircuitState::HalfOpen));

        registry.record_result(feature, false);
        assert_eq!(registry.state_of(feature), Some(CircuitState::HalfOpen));
        assert!(registry.check_breaker(feature));
    }

    #[test]
    fn window_expiry_resets_counters() {
        let (registry, clock) = registry();
        let feature = FeatureId::AiCodingAssistant;
        assert!(registry.check_breaker(feature));
        for _ in 0..9 {
            registry.record_result(feature, false);
        }
        clock.advance_secs(301);
        assert!(registry.check_breaker(feature));
        let state = registry.state_details(feature).unwrap();
        assert_eq!(state.request_count, 0);
        assert_eq!(state.failure_count, 0);

        // One more failure no longer reaches the minimum.
        registry.record_result(feature, false);
        assert_eq!(registry.state_of(feature), Some(CircuitState::Closed));
    }

    #[test]
    fn snapshot_flags_issues() {
        let (registry, _) = registry();
        registry.record_result(FeatureId::MentorChat, true);
        registry.record_result(FeatureId::MentorChat, false);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), FeatureId::ALL.len());
        let mentor = snapshot
            .iter()
            .find(|s| s.feature == FeatureId::MentorChat)
            .unwrap();
        assert_eq!(mentor.request_count, 2);
        assert!(mentor.has_issues());
        assert_eq!(registry.features_with_issues(), 1);
    }

    #[test]
    fn reset_closes_an_open_breaker() {
        let (registry, _) = registry();
        let feature = FeatureId::MentorChat; // min 3
        for _ in 0..3 {
            registry.record_result(feature, false);
        }
        assert!(!registry.check_breaker(feature));
        registry.reset(feature);
        assert!(registry.check_breaker(feature));
        assert_eq!(registry.state_of(feature), Some(CircuitState::Closed));
    }

    #[test]
    fn concurrent_successes_are_all_counted() {
        let (registry, _) = registry();
        let registry = Arc::new(registry);
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        registry.record_result(FeatureId::CodingHints, true);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let state = registry.state_details(FeatureId::CodingHints).unwrap();
        assert_eq!(state.request_count, 40_000);
        assert_eq!(state.failure_count, 0);
        assert_eq!(state.state, CircuitState::Closed);
    }

    #[test]
    fn concurrent_failures_trip_exactly_once() {
        let (registry, _) = registry();
        let registry = Arc::new(registry);
        let feature = FeatureId::MentorChat; // min 3
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        registry.record_result(feature, false);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let state = registry.state_details(feature).unwrap();
        assert_eq!(state.request_count, 8_000);
        assert_eq!(state.failure_count, 8_000);
        assert_eq!(state.state, CircuitState::Open);
        assert_eq!(state.times_opened, 1);
    }
}
