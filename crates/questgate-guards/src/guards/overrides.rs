//! Operator overrides.
//!
//! An override set for a feature wins over every user-specific check in the
//! access evaluator, COPPA included. It does not bypass the emergency layer or
//! the circuit breaker.

use questgate_core::{FeatureId, GateConfig};
use std::collections::BTreeMap;

/// Per-feature forced on/off values, captured once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    overrides: BTreeMap<FeatureId, bool>,
}

impl EnvOverrides {
    /// No overrides
    pub fn none() -> Self {
        Self::default()
    }

    /// Capture from configuration
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            overrides: config.overrides.clone(),
        }
    }

    /// Capture from an explicit variable set using the `FEATURE_<NAME>` convention
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut config = GateConfig::defaults();
        config.merge_with_vars(vars);
        Self::from_config(&config)
    }

    /// Force a feature on or off
    pub fn with(mut self, feature: FeatureId, value: bool) -> Self {
        self.overrides.insert(feature, value);
        self
    }

    /// The override for a feature, `None` when unset
    pub fn override_for(&self, feature: FeatureId) -> Option<bool> {
        self.overrides.get(&feature).copied()
    }

    /// Whether any override is active
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
