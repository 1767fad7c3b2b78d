//! Feature access evaluator
//!
//! Pure allow/deny for one (feature, user) pair. No I/O, no shared state.
//! Checks run in a fixed order and stop at the first denial:
//!
//! 1. operator override (full bypass, either direction)
//! 2. COPPA: under-13 users only reach allow-listed features
//! 3. minimum age (inclusive)
//! 4. minimum progress (inclusive)
//! 5. parental consent, for social features that require it
//!
//! An override that lets an under-13 user into a feature outside the COPPA
//! allow-list is permitted but always produces an audit event on the
//! `questgate::audit` target.

use super::overrides::EnvOverrides;
use super::policy::PolicyTable;
use questgate_core::{FeatureId, GateConfig, GateResult, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Why the evaluator denied access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessDenial {
    /// An operator override forced the feature off
    OverrideForcedOff,
    /// The user is under 13 and the feature is not on the COPPA allow-list
    CoppaRestricted,
    /// The user is younger than the policy minimum
    BelowMinimumAge {
        /// Minimum age
        required: u32,
    },
    /// The user has not completed enough progress units
    InsufficientProgress {
        /// Minimum progress units
        required: u32,
        /// Units still to complete
        remaining: u32,
    },
    /// Social feature without parental consent
    ConsentRequired,
}

impl fmt::Display for AccessDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDenial::OverrideForcedOff => write!(f, "disabled by operator override"),
            AccessDenial::CoppaRestricted => write!(f, "not available for users under 13"),
            AccessDenial::BelowMinimumAge { required } => {
                write!(f, "available when you turn {required}")
            }
            AccessDenial::InsufficientProgress { remaining, .. } => {
                write!(f, "complete {remaining} more quests")
            }
            AccessDenial::ConsentRequired => write!(f, "needs parental consent"),
        }
    }
}

/// Evaluator outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Whether access is allowed
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub denial: Option<AccessDenial>,
    /// The decision came from an operator override
    pub overridden: bool,
    /// An override let an under-13 user past the COPPA restriction
    pub override_bypassed_coppa: bool,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            denial: None,
            overridden: false,
            override_bypassed_coppa: false,
        }
    }

    fn deny(denial: AccessDenial) -> Self {
        Self {
            allowed: false,
            denial: Some(denial),
            overridden: false,
            override_bypassed_coppa: false,
        }
    }
}

/// Combines the policy table and operator overrides
#[derive(Debug, Clone)]
pub struct AccessEvaluator {
    policies: PolicyTable,
    overrides: EnvOverrides,
}

impl AccessEvaluator {
    /// Create an evaluator
    pub fn new(policies: PolicyTable, overrides: EnvOverrides) -> Self {
        Self {
            policies,
            overrides,
        }
    }

    /// Build from startup configuration
    pub fn from_config(config: &GateConfig) -> GateResult<Self> {
        Ok(Self::new(
            PolicyTable::from_config(config)?,
            EnvOverrides::from_config(config),
        ))
    }

    /// The policy table
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// The operator overrides
    pub fn overrides(&self) -> &EnvOverrides {
        &self.overrides
    }

    /// Evaluate one feature for one user
    pub fn evaluate(&self, feature: FeatureId, user: &UserProfile) -> GateResult<AccessDecision> {
        let policy = self.policies.policy_for(feature)?;

        if let Some(forced) = self.overrides.override_for(feature) {
            let bypassed_coppa = forced && user.is_under_13() && !feature.is_coppa_safe();
            if bypassed_coppa {
                warn!(
                    target: "questgate::audit",
                    feature = %feature,
                    age = user.age,
                    "Operator override bypassed COPPA restriction"
                );
            }
            return Ok(AccessDecision {
                allowed: forced,
                denial: (!forced).then_some(AccessDenial::OverrideForcedOff),
                overridden: true,
                override_bypassed_coppa: bypassed_coppa,
            });
        }

        if user.is_under_13() && !feature.is_coppa_safe() {
            return Ok(AccessDecision::deny(AccessDenial::CoppaRestricted));
        }

        if user.age < policy.min_age {
            return Ok(AccessDecision::deny(AccessDenial::BelowMinimumAge {
                required: policy.min_age,
            }));
        }

        if user.progress_units_completed < policy.min_progress_units {
            return Ok(AccessDecision::deny(AccessDenial::InsufficientProgress {
                required: policy.min_progress_units,
                remaining: policy.min_progress_units - user.progress_units_completed,
            }));
        }

        if policy.requires_consent && feature.is_social() && !user.parental_consent_granted {
            return Ok(AccessDecision::deny(AccessDenial::ConsentRequired));
        }

        Ok(AccessDecision::allow())
    }

    /// Evaluate and return only the allow/deny bit
    pub fn is_allowed(&self, feature: FeatureId, user: &UserProfile) -> GateResult<bool> {
        Ok(self.evaluate(feature, user)?.allowed)
    }

    /// Evaluate every registered feature for one user
    pub fn evaluate_all(&self, user: &UserProfile) -> GateResult<BTreeMap<FeatureId, bool>> {
        self.policies
            .features()
            .map(|feature| Ok((feature, self.is_allowed(feature, user)?)))
            .collect()
    }
}
