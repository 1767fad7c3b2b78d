//! Gate configuration
//!
//! Built once at startup in three layers: shipped defaults, then an optional
//! TOML file, then the process environment. Nothing downstream reads the
//! environment again, so a mistyped variable name is reported here instead of
//! silently resolving to "unset" on every request.
//!
//! # Environment Variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `FEATURE_<UPPER_SNAKE_ID>` | `"true"` forces the feature on, any other value forces it off |
//! | `DISABLED_FEATURES` | Comma-separated emergency disable list |
//! | `MAINTENANCE_MODE` | `"true"` switches every feature off |
//! | `EMERGENCY_MESSAGE` | Message shown on the status surface |
//! | `EMERGENCY_CONFIG_URL` | Remote emergency configuration endpoint |

use crate::emergency::{parse_disabled_features, parse_feature_list, EmergencyConfig};
use crate::errors::{GateError, Result};
use crate::feature::FeatureId;
use crate::policy::{AccessPolicy, BreakerConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

/// Variable holding the emergency disable list
pub const DISABLED_FEATURES_VAR: &str = "DISABLED_FEATURES";
/// Variable holding the maintenance flag
pub const MAINTENANCE_MODE_VAR: &str = "MAINTENANCE_MODE";
/// Variable holding the emergency message
pub const EMERGENCY_MESSAGE_VAR: &str = "EMERGENCY_MESSAGE";
/// Variable holding the remote emergency endpoint
pub const EMERGENCY_CONFIG_URL_VAR: &str = "EMERGENCY_CONFIG_URL";

const FEATURE_VAR_PREFIX: &str = "FEATURE_";

/// Emergency layer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencySettings {
    /// Remote endpoint; when unset the environment values below are used
    pub endpoint: Option<String>,
    /// How long a fetched configuration stays fresh
    pub cache_ttl_secs: u64,
    /// Upper bound on a single fetch
    pub fetch_timeout_ms: u64,
    /// Environment-sourced disable list
    pub disabled_features: BTreeSet<FeatureId>,
    /// Environment-sourced maintenance flag
    pub maintenance_mode: bool,
    /// Environment-sourced message
    pub message: Option<String>,
}

impl Default for EmergencySettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            cache_ttl_secs: 30,
            fetch_timeout_ms: 2_000,
            disabled_features: BTreeSet::new(),
            maintenance_mode: false,
            message: None,
        }
    }
}

impl EmergencySettings {
    /// Cache time-to-live
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Fetch timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// The environment-sourced emergency configuration
    pub fn env_config(&self) -> EmergencyConfig {
        EmergencyConfig {
            disabled_features: self.disabled_features.clone(),
            maintenance_mode_active: self.maintenance_mode,
            emergency_message: self.message.clone(),
        }
    }
}

/// Complete gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Access policy per feature
    pub policies: BTreeMap<FeatureId, AccessPolicy>,
    /// Breaker thresholds per feature; absent means no breaker protection
    pub breakers: BTreeMap<FeatureId, BreakerConfig>,
    /// Operator overrides; highest precedence in the access evaluator
    pub overrides: BTreeMap<FeatureId, bool>,
    /// Emergency layer settings
    pub emergency: EmergencySettings,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl GateConfig {
    /// Shipped configuration: every policy and breaker, no overrides
    pub fn defaults() -> Self {
        let policies = FeatureId::ALL
            .iter()
            .map(|feature| (*feature, AccessPolicy::default_for(*feature)))
            .collect();
        let breakers = FeatureId::ALL
            .iter()
            .map(|feature| (*feature, BreakerConfig::default_for(*feature)))
            .collect();
        Self {
            policies,
            breakers,
            overrides: BTreeMap::new(),
            emergency: EmergencySettings::default(),
        }
    }

    /// Defaults, then `path` if it exists, then the process environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::defaults();
        if let Some(path) = path {
            if path.exists() {
                let file = Self::load_from_file(path)?;
                config.merge_with(&file);
            } else {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
            }
        }
        config.merge_with_env();
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file layered over the defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML layered over the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: GateConfigFile = toml::from_str(content)?;
        let mut config = Self::defaults();
        file.apply_to(&mut config)?;
        Ok(config)
    }

    /// Merge another configuration over this one; entries in `other` win per feature
    pub fn merge_with(&mut self, other: &Self) {
        self.policies
            .extend(other.policies.iter().map(|(k, v)| (*k, *v)));
        self.breakers
            .extend(other.breakers.iter().map(|(k, v)| (*k, *v)));
        self.overrides
            .extend(other.overrides.iter().map(|(k, v)| (*k, *v)));
        self.emergency = other.emergency.clone();
    }

    /// Merge values from the process environment
    pub fn merge_with_env(&mut self) {
        self.merge_with_vars(std::env::vars());
    }

    /// Merge values from an explicit set of variables
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for feature in FeatureId::ALL {
            if let Some(value) = vars.get(&feature.override_env_var()) {
                self.overrides.insert(feature, value == "true");
            }
        }

        for name in vars.keys().filter(|k| k.starts_with(FEATURE_VAR_PREFIX)) {
            let known = FeatureId::ALL
                .iter()
                .any(|feature| feature.override_env_var() == *name);
            if !known {
                tracing::warn!(variable = %name, "Override variable matches no known feature");
            }
        }

        if let Some(value) = vars.get(DISABLED_FEATURES_VAR) {
            self.emergency.disabled_features = parse_disabled_features(value);
        }
        if let Some(value) = vars.get(MAINTENANCE_MODE_VAR) {
            self.emergency.maintenance_mode = value == "true";
        }
        if let Some(value) = vars.get(EMERGENCY_MESSAGE_VAR) {
            self.emergency.message = Some(value.clone()).filter(|m| !m.is_empty());
        }
        if let Some(value) = vars.get(EMERGENCY_CONFIG_URL_VAR) {
            self.emergency.endpoint = Some(value.clone()).filter(|u| !u.is_empty());
        }
    }

    /// Validate every policy and breaker, and the emergency settings
    pub fn validate(&self) -> Result<()> {
        for (feature, policy) in &self.policies {
            policy.validate(*feature)?;
        }
        for (feature, breaker) in &self.breakers {
            breaker.validate(*feature)?;
        }
        if self.emergency.cache_ttl_secs == 0 {
            return Err(GateError::config("emergency.cache_ttl_secs must be positive"));
        }
        if self.emergency.fetch_timeout_ms == 0 {
            return Err(GateError::config("emergency.fetch_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// On-disk form. Feature keys stay strings until `apply_to` so an unknown
/// feature is reported by name.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GateConfigFile {
    policies: BTreeMap<String, PolicyEntryFile>,
    breakers: BTreeMap<String, BreakerConfig>,
    overrides: BTreeMap<String, bool>,
    emergency: EmergencyFile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyEntryFile {
    min_age: u32,
    min_progress_units: u32,
    requires_consent: Option<bool>,
    coppa_allowed: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EmergencyFile {
    endpoint: Option<String>,
    cache_ttl_secs: Option<u64>,
    fetch_timeout_ms: Option<u64>,
    disabled_features: Vec<String>,
    maintenance_mode: bool,
    message: Option<String>,
}

impl GateConfigFile {
    fn apply_to(self, config: &mut GateConfig) -> Result<()> {
        for (name, entry) in self.policies {
            let feature: FeatureId = name.parse()?;
            let mut policy =
                AccessPolicy::for_feature(feature, entry.min_age, entry.min_progress_units);
            if let Some(requires_consent) = entry.requires_consent {
                policy.requires_consent = requires_consent;
            }
            if let Some(coppa_allowed) = entry.coppa_allowed {
                policy.coppa_allowed = coppa_allowed;
            }
            config.policies.insert(feature, policy);
        }
        for (name, breaker) in self.breakers {
            config.breakers.insert(name.parse()?, breaker);
        }
        for (name, value) in self.overrides {
            config.overrides.insert(name.parse()?, value);
        }

        let emergency = &mut config.emergency;
        emergency.endpoint = self.emergency.endpoint.filter(|u| !u.is_empty());
        if let Some(ttl) = self.emergency.cache_ttl_secs {
            emergency.cache_ttl_secs = ttl;
        }
        if let Some(timeout) = self.emergency.fetch_timeout_ms {
            emergency.fetch_timeout_ms = timeout;
        }
        emergency.disabled_features =
            parse_feature_list(self.emergency.disabled_features.iter().map(String::as_str));
        emergency.maintenance_mode = self.emergency.maintenance_mode;
        emergency.message = self.emergency.message.filter(|m| !m.is_empty());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_feature() {
        let config = GateConfig::defaults();
        assert_eq!(config.policies.len(), FeatureId::ALL.len());
        assert_eq!(config.breakers.len(), FeatureId::ALL.len());
        assert!(config.overrides.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn override_values_follow_true_or_false_rule() {
        let mut config = GateConfig::defaults();
        config.merge_with_vars([
            ("FEATURE_AI_CODING_ASSISTANT", "true"),
            ("FEATURE_MENTOR_CHAT", "TRUE"),
            ("FEATURE_CODING_HINTS", "yes"),
        ]);
        assert_eq!(config.overrides.get(&FeatureId::AiCodingAssistant), Some(&true));
        assert_eq!(config.overrides.get(&FeatureId::MentorChat), Some(&false));
        assert_eq!(config.overrides.get(&FeatureId::CodingHints), Some(&false));
        assert_eq!(config.overrides.get(&FeatureId::GithubIntegration), None);
    }

    #[test]
    fn emergency_variables_are_captured() {
        let mut config = GateConfig::defaults();
        config.merge_with_vars([
            (DISABLED_FEATURES_VAR, "mentor-chat,feature-x"),
            (MAINTENANCE_MODE_VAR, "true"),
            (EMERGENCY_MESSAGE_VAR, "Back soon"),
        ]);
        let env = config.emergency.env_config();
        assert!(env.maintenance_mode_active);
        assert_eq!(env.disabled_features.len(), 1);
        assert!(env.disabled_features.contains(&FeatureId::MentorChat));
        assert_eq!(env.emergency_message.as_deref(), Some("Back soon"));
    }

    #[test]
    fn maintenance_requires_literal_true() {
        let mut config = GateConfig::defaults();
        config.merge_with_vars([(MAINTENANCE_MODE_VAR, "1")]);
        assert!(!config.emergency.maintenance_mode);
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let mut config = GateConfig::defaults();
        config.emergency.cache_ttl_secs = 0;
        assert!(config.validate().is_err());
    }
}
