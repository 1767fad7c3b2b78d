//! Emergency configuration: the operator-controlled global kill switch

use crate::feature::FeatureId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Global kill-switch state
///
/// The default value is the fail-open configuration: nothing disabled,
/// maintenance off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyConfig {
    /// Features switched off regardless of any other layer
    pub disabled_features: BTreeSet<FeatureId>,
    /// Every feature is switched off while this is set
    pub maintenance_mode_active: bool,
    /// Optional message for the status surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_message: Option<String>,
}

impl EmergencyConfig {
    /// Whether the feature is blocked by maintenance mode or the disabled list
    pub fn blocks(&self, feature: FeatureId) -> bool {
        self.maintenance_mode_active || self.disabled_features.contains(&feature)
    }

    /// Build from the loosely-typed wire form, dropping unknown feature names
    pub fn from_wire(wire: EmergencyConfigWire) -> Self {
        Self {
            disabled_features: parse_feature_list(wire.disabled_features.iter().map(String::as_str)),
            maintenance_mode_active: wire.maintenance_mode,
            emergency_message: wire.emergency_message.filter(|m| !m.is_empty()),
        }
    }
}

/// Emergency configuration as served by the remote parameter endpoint
///
/// Feature names stay strings here so one unknown entry does not reject the
/// whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyConfigWire {
    /// Disabled feature identifiers
    #[serde(default)]
    pub disabled_features: Vec<String>,
    /// Maintenance mode flag
    #[serde(default)]
    pub maintenance_mode: bool,
    /// Optional operator message
    #[serde(default)]
    pub emergency_message: Option<String>,
}

/// Parse a list of feature identifiers, skipping blanks and unknown names
pub fn parse_feature_list<'a>(entries: impl IntoIterator<Item = &'a str>) -> BTreeSet<FeatureId> {
    entries
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<FeatureId>() {
            Ok(feature) => Some(feature),
            Err(_) => {
                tracing::warn!(entry = %entry, "Ignoring unknown feature in emergency disable list");
                None
            }
        })
        .collect()
}

/// Parse the comma-separated `DISABLED_FEATURES` value
pub fn parse_disabled_features(value: &str) -> BTreeSet<FeatureId> {
    parse_feature_list(value.split(','))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_blocks_nothing() {
        let config = EmergencyConfig::default();
        for feature in FeatureId::ALL {
            assert!(!config.blocks(feature));
        }
    }

    #[test]
    fn maintenance_blocks_everything() {
        let config = EmergencyConfig {
            maintenance_mode_active: true,
            ..Default::default()
        };
        assert!(FeatureId::ALL.iter().all(|feature| config.blocks(*feature)));
    }

    #[test]
    fn disabled_list_blocks_only_listed_features() {
        let config = EmergencyConfig {
            disabled_features: parse_disabled_features("mentor-chat, github-integration"),
            ..Default::default()
        };
        assert!(config.blocks(FeatureId::MentorChat));
        assert!(config.blocks(FeatureId::GithubIntegration));
        assert!(!config.blocks(FeatureId::CodingHints));
    }

    #[test]
    fn unknown_and_blank_entries_are_dropped() {
        let parsed = parse_disabled_features("feature-x,,coding-hints, ");
        assert_eq!(parsed.len(), 1);
        assert!(parsed.contains(&FeatureId::CodingHints));
        assert!(parse_disabled_features("").is_empty());
    }

    #[test]
    fn wire_document_parses() {
        let wire: EmergencyConfigWire = serde_json::from_str(
            r#"{"disabledFeatures":["ai-coding-assistant","warp-drive"],"maintenanceMode":false,"emergencyMessage":"AI helper paused"}"#,
        )
        .unwrap();
        let config = EmergencyConfig::from_wire(wire);
        assert!(config.blocks(FeatureId::AiCodingAssistant));
        assert_eq!(config.disabled_features.len(), 1);
        assert_eq!(config.emergency_message.as_deref(), Some("AI helper paused"));
    }

    #[test]
    fn wire_document_tolerates_missing_fields() {
        let wire: EmergencyConfigWire = serde_json::from_str("{}").unwrap();
        assert_eq!(EmergencyConfig::from_wire(wire), EmergencyConfig::default());
    }
}
