//! Composite feature gate
//!
//! The single entry point callers use. Layers run in a fixed order and stop at
//! the first refusal:
//!
//! ```text
//! emergency (maintenance, disable list) -> access evaluator -> circuit breaker
//! ```
//!
//! Emergency is consulted first so maintenance mode costs no policy work and
//! never touches breaker state. The breaker runs last, so only requests that
//! would otherwise proceed can move a breaker into half-open.
//!
//! Denial is an ordinary `enabled: false` result. The only error path is a
//! feature missing from the policy table, which is a deployment bug.

use super::access::{AccessDenial, AccessEvaluator};
use super::breaker::{BreakerRegistry, BreakerSnapshot};
use super::emergency::{EmergencyConfigSource, EmergencyLayer};
use super::hints::{next_unlock_hints, UnlockHint};
use questgate_core::{
    EmergencyConfig, FeatureId, GateConfig, GateResult, PhysicalTimeEffects, RealTimeHandler,
    UserProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Why the gate refused a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
    /// Maintenance mode is active
    Maintenance,
    /// The feature is on the emergency disable list
    EmergencyDisabled,
    /// An operator override forced the feature off
    OverrideForcedOff,
    /// Under-13 user, feature outside the COPPA allow-list
    CoppaRestricted,
    /// User below the minimum age
    BelowMinimumAge {
        /// Minimum age
        required: u32,
    },
    /// Not enough completed progress units
    InsufficientProgress {
        /// Minimum progress units
        required: u32,
        /// Units still to complete
        remaining: u32,
    },
    /// Social feature without parental consent
    ConsentRequired,
    /// The feature's circuit breaker is open
    BreakerOpen,
}

impl From<AccessDenial> for DenialReason {
    fn from(denial: AccessDenial) -> Self {
        match denial {
            AccessDenial::OverrideForcedOff => DenialReason::OverrideForcedOff,
            AccessDenial::CoppaRestricted => DenialReason::CoppaRestricted,
            AccessDenial::BelowMinimumAge { required } => DenialReason::BelowMinimumAge { required },
            AccessDenial::InsufficientProgress {
                required,
                remaining,
            } => DenialReason::InsufficientProgress {
                required,
                remaining,
            },
            AccessDenial::ConsentRequired => DenialReason::ConsentRequired,
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Maintenance => write!(f, "platform is in maintenance mode"),
            DenialReason::EmergencyDisabled => write!(f, "temporarily disabled by operators"),
            DenialReason::OverrideForcedOff => write!(f, "{}", AccessDenial::OverrideForcedOff),
            DenialReason::CoppaRestricted => write!(f, "{}", AccessDenial::CoppaRestricted),
            DenialReason::BelowMinimumAge { required } => {
                write!(f, "{}", AccessDenial::BelowMinimumAge { required: *required })
            }
            DenialReason::InsufficientProgress {
                required,
                remaining,
            } => write!(
                f,
                "{}",
                AccessDenial::InsufficientProgress {
                    required: *required,
                    remaining: *remaining,
                }
            ),
            DenialReason::ConsentRequired => write!(f, "{}", AccessDenial::ConsentRequired),
            DenialReason::BreakerOpen => write!(f, "temporarily unavailable, please try again soon"),
        }
    }
}

/// Composite decision for one (feature, user) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    /// Feature evaluated
    pub feature: FeatureId,
    /// Final answer
    pub enabled: bool,
    /// First layer that refused, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial: Option<DenialReason>,
    /// Operator message attached to an emergency denial
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_message: Option<String>,
    /// The access layer answered from an operator override
    pub override_applied: bool,
}

impl GateDecision {
    fn denied(feature: FeatureId, reason: DenialReason) -> Self {
        Self {
            feature,
            enabled: false,
            denial: Some(reason),
            emergency_message: None,
            override_applied: false,
        }
    }
}

/// Emergency layer, access evaluator and breaker registry behind one call
#[derive(Debug)]
pub struct FeatureGate {
    evaluator: AccessEvaluator,
    breakers: BreakerRegistry,
    emergency: EmergencyLayer,
}

impl FeatureGate {
    /// Assemble a gate from its layers
    pub fn new(evaluator: AccessEvaluator, breakers: BreakerRegistry, emergency: EmergencyLayer) -> Self {
        Self {
            evaluator,
            breakers,
            emergency,
        }
    }

    /// Build every layer from startup configuration
    pub fn from_config(config: &GateConfig, time: Arc<dyn PhysicalTimeEffects>) -> GateResult<Self> {
        config.validate()?;
        let evaluator = AccessEvaluator::from_config(config)?;
        let breakers = BreakerRegistry::from_config(config, time.clone());
        let emergency = EmergencyLayer::from_settings(&config.emergency, time)?;
        Ok(Self::new(evaluator, breakers, emergency))
    }

    /// Production gate on the system clock
    pub fn with_real_time(config: &GateConfig) -> GateResult<Self> {
        Self::from_config(config, Arc::new(RealTimeHandler::new()))
    }

    /// Replace the emergency configuration source, keeping TTL and timeout
    pub fn with_emergency_source(mut self, source: Arc<dyn EmergencyConfigSource>) -> Self {
        self.emergency = self.emergency.with_source(source);
        self
    }

    /// Access evaluator layer
    pub fn evaluator(&self) -> &AccessEvaluator {
        &self.evaluator
    }

    /// Breaker registry layer
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Emergency layer
    pub fn emergency(&self) -> &EmergencyLayer {
        &self.emergency
    }

    /// Full decision with the refusing layer
    pub async fn decide(&self, feature: FeatureId, user: &UserProfile) -> GateResult<GateDecision> {
        let emergency = self.emergency.current_config().await;
        if emergency.blocks(feature) {
            let reason = if emergency.maintenance_mode_active {
                DenialReason::Maintenance
            } else {
                DenialReason::EmergencyDisabled
            };
            debug!(feature = %feature, reason = ?reason, "Feature blocked by emergency layer");
            return Ok(GateDecision {
                emergency_message: emergency.emergency_message,
                ..GateDecision::denied(feature, reason)
            });
        }

        let access = self.evaluator.evaluate(feature, user).map_err(|e| {
            error!(feature = %feature, error = %e, "Feature gate misconfigured");
            e
        })?;
        if let Some(denial) = access.denial {
            return Ok(GateDecision {
                override_applied: access.overridden,
                ..GateDecision::denied(feature, denial.into())
            });
        }

        if !self.breakers.check_breaker(feature) {
            return Ok(GateDecision {
                override_applied: access.overridden,
                ..GateDecision::denied(feature, DenialReason::BreakerOpen)
            });
        }

        Ok(GateDecision {
            feature,
            enabled: true,
            denial: None,
            emergency_message: None,
            override_applied: access.overridden,
        })
    }

    /// Whether the feature is enabled for the user right now
    pub async fn is_enabled(&self, feature: FeatureId, user: &UserProfile) -> GateResult<bool> {
        Ok(self.decide(feature, user).await?.enabled)
    }

    /// [`Self::is_enabled`] for a feature name from an untyped boundary
    pub async fn is_enabled_by_name(&self, feature: &str, user: &UserProfile) -> GateResult<bool> {
        let feature: FeatureId = feature.parse().map_err(|e| {
            error!(feature, "Feature gate asked about an unknown feature");
            e
        })?;
        self.is_enabled(feature, user).await
    }

    /// Report the outcome of an invocation of a gated feature
    pub fn record_outcome(&self, feature: FeatureId, success: bool) {
        self.breakers.record_result(feature, success);
    }

    /// [`Self::record_outcome`] for a feature name from an untyped boundary
    pub fn record_outcome_by_name(&self, feature: &str, success: bool) -> GateResult<()> {
        let feature: FeatureId = feature.parse().map_err(|e| {
            error!(feature, "Outcome recorded for an unknown feature");
            e
        })?;
        self.record_outcome(feature, success);
        Ok(())
    }

    /// Locked features and what unlocks them
    pub fn next_unlock_hints(&self, user: &UserProfile) -> GateResult<Vec<UnlockHint>> {
        next_unlock_hints(&self.evaluator, user)
    }

    /// Evaluator-only answer for every feature; no breaker or emergency effects
    pub fn evaluate_all(&self, user: &UserProfile) -> GateResult<BTreeMap<FeatureId, bool>> {
        self.evaluator.evaluate_all(user)
    }

    /// Current emergency configuration
    pub async fn current_emergency_config(&self) -> EmergencyConfig {
        self.emergency.current_config().await
    }

    /// Per-feature breaker state for the status surface
    pub fn breaker_snapshot(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshot()
    }

    /// Number of features with a high error rate or a non-closed breaker
    pub fn features_with_issues(&self) -> usize {
        self.breakers.features_with_issues()
    }

    /// Operator reset of one breaker
    pub fn reset_breaker(&self, feature: FeatureId) {
        self.breakers.reset(feature);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::guards::StaticEmergencySource;
    use questgate_core::SimulatedTimeHandler;
    use std::collections::BTreeSet;

    fn gate() -> FeatureGate {
        FeatureGate::from_config(
            &GateConfig::defaults(),
            Arc::new(SimulatedTimeHandler::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn allows_when_every_layer_passes() {
        let user = UserProfile::new(14, 10).with_parental_consent(true);
        let decision = gate().decide(FeatureId::StepByStepDebugging, &user).await.unwrap();
        assert!(decision.enabled);
        assert_eq!(decision.denial, None);
    }

    #[tokio::test]
    async fn maintenance_wins_over_everything() {
        let gate = gate().with_emergency_source(Arc::new(StaticEmergencySource::new(
            EmergencyConfig {
                maintenance_mode_active: true,
                emergency_message: Some("Upgrading".to_string()),
                ..EmergencyConfig::default()
            },
        )));
        let user = UserProfile::new(17, 100).with_parental_consent(true);
        let decision = gate.decide(FeatureId::CodingHints, &user).await.unwrap();
        assert_eq!(decision.denial, Some(DenialReason::Maintenance));
        assert_eq!(decision.emergency_message.as_deref(), Some("Upgrading"));
    }

    #[tokio::test]
    async fn emergency_block_does_not_touch_breaker_state() {
        let gate = gate().with_emergency_source(Arc::new(StaticEmergencySource::new(
            EmergencyConfig {
                disabled_features: BTreeSet::from([FeatureId::CodingHints]),
                ..EmergencyConfig::default()
            },
        )));
        let user = UserProfile::new(12, 0);
        let decision = gate.decide(FeatureId::CodingHints, &user).await.unwrap();
        assert_eq!(decision.denial, Some(DenialReason::EmergencyDisabled));
        assert!(gate.breakers().state_details(FeatureId::CodingHints).is_none());
    }

    #[tokio::test]
    async fn access_denial_is_reported() {
        let user = UserProfile::new(11, 100);
        let decision = gate().decide(FeatureId::MentorChat, &user).await.unwrap();
        assert!(!decision.enabled);
        assert_eq!(decision.denial, Some(DenialReason::CoppaRestricted));
    }

    #[test]
    fn decision_wire_shape() {
        let decision = GateDecision::denied(
            FeatureId::MentorChat,
            DenialReason::BelowMinimumAge { required: 15 },
        );
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "feature": "mentor-chat",
                "enabled": false,
                "denial": { "kind": "below_minimum_age", "required": 15 },
                "overrideApplied": false,
            })
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unknown_outcome_name_is_logged_as_error() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .finish();

        let gate = gate();
        let result = tracing::subscriber::with_default(subscriber, || {
            gate.record_outcome_by_name("time-travel", false)
        });

        assert!(result.is_err());
        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("ERROR"), "{output}");
        assert!(output.contains("Outcome recorded for an unknown feature"));
    }

    #[tokio::test]
    async fn unknown_name_is_an_error() {
        let user = UserProfile::new(14, 10);
        assert!(gate().is_enabled_by_name("time-travel", &user).await.is_err());
        assert!(gate().record_outcome_by_name("time-travel", true).is_err());
    }
}
