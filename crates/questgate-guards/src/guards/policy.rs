//! Access policy table: feature → age/progress requirements.

use questgate_core::{AccessPolicy, FeatureId, GateConfig, GateError, GateResult};
use std::collections::BTreeMap;

/// Static lookup of access policies, validated at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    entries: BTreeMap<FeatureId, AccessPolicy>,
}

impl PolicyTable {
    /// Build a table, validating every entry
    pub fn new(entries: BTreeMap<FeatureId, AccessPolicy>) -> GateResult<Self> {
        for (feature, policy) in &entries {
            policy.validate(*feature)?;
        }
        Ok(Self { entries })
    }

    /// The shipped table covering every feature
    pub fn shipped() -> Self {
        let entries = FeatureId::ALL
            .iter()
            .map(|feature| (*feature, AccessPolicy::default_for(*feature)))
            .collect();
        Self { entries }
    }

    /// Build from startup configuration
    pub fn from_config(config: &GateConfig) -> GateResult<Self> {
        Self::new(config.policies.clone())
    }

    /// Policy for a feature
    ///
    /// A missing entry is a deployment bug and is reported as
    /// [`GateError::UnknownFeature`], never as a denial.
    pub fn policy_for(&self, feature: FeatureId) -> GateResult<&AccessPolicy> {
        self.entries
            .get(&feature)
            .ok_or_else(|| GateError::unknown_feature(feature.as_str()))
    }

    /// Registered features in catalogue order
    pub fn features(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.entries.keys().copied()
    }

    /// Registered (feature, policy) pairs in catalogue order
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &AccessPolicy)> {
        self.entries.iter().map(|(feature, policy)| (*feature, policy))
    }
}
