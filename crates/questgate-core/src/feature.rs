//! Feature catalogue
//!
//! The set of gated platform capabilities is fixed at deployment. Identifiers
//! travel over the wire in kebab-case (`ai-coding-assistant`) and are parsed
//! into [`FeatureId`] at the edge, so everything past the parser works with a
//! closed enum instead of free-form strings.

use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A gated platform capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureId {
    // Core learning features
    /// Contextual hints inside quests
    CodingHints,
    /// AI pair-programming assistant
    AiCodingAssistant,
    /// Guided debugger
    StepByStepDebugging,

    // Social/collaborative features
    /// Reviewing other students' code
    PeerCodeReview,
    /// Community coding challenges
    CommunityChallenges,
    /// Chat with a mentor
    MentorChat,

    // Advanced features
    /// Linking a GitHub account
    GithubIntegration,
    /// Contributing to real open-source projects
    OpenSourceContributions,
    /// Advanced algorithms track
    AdvancedAlgorithms,

    // Experimental features
    /// Redesigned quest flow
    NewQuestFlow,
    /// Second-generation rewards and badges
    GamificationV2,
}

impl FeatureId {
    /// Every feature, in catalogue order
    pub const ALL: [FeatureId; 11] = [
        FeatureId::CodingHints,
        FeatureId::AiCodingAssistant,
        FeatureId::StepByStepDebugging,
        FeatureId::PeerCodeReview,
        FeatureId::CommunityChallenges,
        FeatureId::MentorChat,
        FeatureId::GithubIntegration,
        FeatureId::OpenSourceContributions,
        FeatureId::AdvancedAlgorithms,
        FeatureId::NewQuestFlow,
        FeatureId::GamificationV2,
    ];

    /// Features usable by children under 13 without additional restriction
    pub const COPPA_ALLOW_LIST: [FeatureId; 3] = [
        FeatureId::CodingHints,
        FeatureId::NewQuestFlow,
        FeatureId::GamificationV2,
    ];

    /// Features that involve contact with other people
    pub const SOCIAL: [FeatureId; 3] = [
        FeatureId::PeerCodeReview,
        FeatureId::CommunityChallenges,
        FeatureId::MentorChat,
    ];

    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureId::CodingHints => "coding-hints",
            FeatureId::AiCodingAssistant => "ai-coding-assistant",
            FeatureId::StepByStepDebugging => "step-by-step-debugging",
            FeatureId::PeerCodeReview => "peer-code-review",
            FeatureId::CommunityChallenges => "community-challenges",
            FeatureId::MentorChat => "mentor-chat",
            FeatureId::GithubIntegration => "github-integration",
            FeatureId::OpenSourceContributions => "open-source-contributions",
            FeatureId::AdvancedAlgorithms => "advanced-algorithms",
            FeatureId::NewQuestFlow => "new-quest-flow",
            FeatureId::GamificationV2 => "gamification-v2",
        }
    }

    /// Whether the feature is on the COPPA allow-list
    pub fn is_coppa_safe(&self) -> bool {
        Self::COPPA_ALLOW_LIST.contains(self)
    }

    /// Whether the feature is classified as social
    pub fn is_social(&self) -> bool {
        Self::SOCIAL.contains(self)
    }

    /// Name of the environment variable that force-enables or disables this feature
    ///
    /// `ai-coding-assistant` maps to `FEATURE_AI_CODING_ASSISTANT`.
    pub fn override_env_var(&self) -> String {
        format!("FEATURE_{}", self.as_str().to_ascii_uppercase().replace('-', "_"))
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureId {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        FeatureId::ALL
            .iter()
            .copied()
            .find(|feature| feature.as_str() == trimmed)
            .ok_or_else(|| GateError::unknown_feature(trimmed))
    }
}
