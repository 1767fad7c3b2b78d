//! Access policies and circuit breaker configuration
//!
//! Both are static: loaded once at process start and never mutated. The
//! defaults below are the values the platform ships with; deployments can
//! replace individual entries through the configuration file.

use crate::errors::{GateError, Result};
use crate::feature::FeatureId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Age and progress requirements for one feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Minimum age in years (inclusive)
    pub min_age: u32,
    /// Minimum completed progress units (inclusive)
    pub min_progress_units: u32,
    /// Parental consent needed (only enforced for social features)
    pub requires_consent: bool,
    /// Usable by children under 13
    pub coppa_allowed: bool,
}

impl AccessPolicy {
    /// Policy with the feature's fixed classifications filled in
    pub fn for_feature(feature: FeatureId, min_age: u32, min_progress_units: u32) -> Self {
        Self {
            min_age,
            min_progress_units,
            requires_consent: feature.is_social(),
            coppa_allowed: feature.is_coppa_safe(),
        }
    }

    /// Shipped policy for a feature
    pub fn default_for(feature: FeatureId) -> Self {
        let (min_age, min_progress) = match feature {
            FeatureId::CodingHints => (11, 0),
            FeatureId::AiCodingAssistant => (12, 5),
            FeatureId::StepByStepDebugging => (13, 10),
            FeatureId::PeerCodeReview => (14, 25),
            FeatureId::CommunityChallenges => (14, 15),
            FeatureId::MentorChat => (15, 20),
            FeatureId::GithubIntegration => (16, 30),
            FeatureId::OpenSourceContributions => (17, 50),
            FeatureId::AdvancedAlgorithms => (16, 40),
            FeatureId::NewQuestFlow => (11, 0),
            FeatureId::GamificationV2 => (11, 0),
        };
        Self::for_feature(feature, min_age, min_progress)
    }

    /// Check the policy is consistent with the feature's fixed classifications
    ///
    /// A `coppa_allowed` flag that disagrees with the compiled-in allow-list is
    /// rejected. A consent flag that disagrees with the social classification
    /// is only reported, because the evaluator enforces consent solely when
    /// both agree.
    pub fn validate(&self, feature: FeatureId) -> Result<()> {
        if self.coppa_allowed != feature.is_coppa_safe() {
            return Err(GateError::config(format!(
                "policy for {feature} sets coppa_allowed = {} but the COPPA allow-list says {}",
                self.coppa_allowed,
                feature.is_coppa_safe()
            )));
        }
        if self.requires_consent != feature.is_social() {
            tracing::warn!(
                feature = %feature,
                requires_consent = self.requires_consent,
                social = feature.is_social(),
                "Consent flag out of sync with social classification"
            );
        }
        Ok(())
    }
}

/// Thresholds for one feature's circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Error ratio that trips the breaker, in (0, 1]
    pub error_threshold_ratio: f64,
    /// Length of the observation window in seconds
    pub observation_window_secs: u64,
    /// Requests needed in the window before the ratio is evaluated
    pub min_requests_before_evaluation: u32,
    /// Seconds the breaker stays open before allowing a trial request
    pub recovery_timeout_secs: u64,
}

impl BreakerConfig {
    /// Create a breaker configuration
    pub fn new(
        error_threshold_ratio: f64,
        observation_window_secs: u64,
        min_requests_before_evaluation: u32,
        recovery_timeout_secs: u64,
    ) -> Self {
        Self {
            error_threshold_ratio,
            observation_window_secs,
            min_requests_before_evaluation,
            recovery_timeout_secs,
        }
    }

    /// Shipped breaker configuration for a feature
    ///
    /// Core learning features are tolerant, advanced features strict.
    pub fn default_for(feature: FeatureId) -> Self {
        match feature {
            FeatureId::AiCodingAssistant => Self::new(0.05, 300, 10, 60),
            FeatureId::GithubIntegration => Self::new(0.03, 180, 5, 120),
            FeatureId::PeerCodeReview => Self::new(0.10, 600, 3, 300),
            FeatureId::CodingHints => Self::new(0.15, 300, 20, 30),
            FeatureId::StepByStepDebugging => Self::new(0.10, 300, 15, 60),
            FeatureId::CommunityChallenges => Self::new(0.20, 600, 5, 600),
            FeatureId::MentorChat => Self::new(0.05, 300, 3, 300),
            FeatureId::OpenSourceContributions => Self::new(0.02, 300, 3, 900),
            FeatureId::AdvancedAlgorithms => Self::new(0.10, 300, 10, 180),
            FeatureId::NewQuestFlow => Self::new(0.08, 300, 10, 120),
            FeatureId::GamificationV2 => Self::new(0.12, 300, 15, 90),
        }
    }

    /// Observation window as a duration
    pub fn observation_window(&self) -> Duration {
        Duration::from_secs(self.observation_window_secs)
    }

    /// Recovery timeout as a duration
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    /// Reject thresholds outside their documented ranges
    pub fn validate(&self, feature: FeatureId) -> Result<()> {
        if !(self.error_threshold_ratio > 0.0 && self.error_threshold_ratio <= 1.0) {
            return Err(GateError::config(format!(
                "breaker for {feature}: error_threshold_ratio must be in (0, 1], got {}",
                self.error_threshold_ratio
            )));
        }
        if self.observation_window_secs == 0 {
            return Err(GateError::config(format!(
                "breaker for {feature}: observation_window_secs must be positive"
            )));
        }
        if self.min_requests_before_evaluation == 0 {
            return Err(GateError::config(format!(
                "breaker for {feature}: min_requests_before_evaluation must be positive"
            )));
        }
        if self.recovery_timeout_secs == 0 {
            return Err(GateError::config(format!(
                "breaker for {feature}: recovery_timeout_secs must be positive"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn shipped_policies_are_consistent() {
        for feature in FeatureId::ALL {
            AccessPolicy::default_for(feature).validate(feature).unwrap();
        }
    }

    #[test]
    fn shipped_breakers_are_valid() {
        for feature in FeatureId::ALL {
            BreakerConfig::default_for(feature).validate(feature).unwrap();
        }
        let strict = BreakerConfig::default_for(FeatureId::OpenSourceContributions);
        assert_eq!(strict.error_threshold_ratio, 0.02);
        assert_eq!(strict.recovery_timeout_secs, 900);
    }

    #[test]
    fn coppa_mismatch_is_rejected() {
        let mut policy = AccessPolicy::default_for(FeatureId::MentorChat);
        policy.coppa_allowed = true;
        assert!(matches!(
            policy.validate(FeatureId::MentorChat),
            Err(GateError::Config { .. })
        ));
    }

    #[test]
    fn consent_mismatch_is_tolerated() {
        let mut policy = AccessPolicy::default_for(FeatureId::GithubIntegration);
        policy.requires_consent = true;
        assert!(policy.validate(FeatureId::GithubIntegration).is_ok());
    }

    #[test]
    fn out_of_range_ratio_is_rejected() {
        let zero = BreakerConfig::new(0.0, 300, 10, 60);
        assert!(zero.validate(FeatureId::CodingHints).is_err());
        let above_one = BreakerConfig::new(1.5, 300, 10, 60);
        assert!(above_one.validate(FeatureId::CodingHints).is_err());
        let exactly_one = BreakerConfig::new(1.0, 300, 10, 60);
        assert!(exactly_one.validate(FeatureId::CodingHints).is_ok());
    }

    #[test]
    fn social_features_require_consent_by_default() {
        assert!(AccessPolicy::default_for(FeatureId::PeerCodeReview).requires_consent);
        assert!(!AccessPolicy::default_for(FeatureId::AiCodingAssistant).requires_consent);
    }
}
