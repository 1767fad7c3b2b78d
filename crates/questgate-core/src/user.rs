//! Student profiles as supplied by the caller for each evaluation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::GateError;

/// Self-reported skill level. Informational only; never used for gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    /// Just getting started
    #[default]
    Beginner,
    /// Comfortable with the basics
    Intermediate,
    /// Ready for real-world projects
    Advanced,
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        };
        f.write_str(name)
    }
}

impl FromStr for SkillLevel {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            other => Err(GateError::invalid(format!("unknown skill level '{other}'"))),
        }
    }
}

/// Everything the gate needs to know about a student
///
/// Immutable for the duration of one evaluation; the gate keeps no session
/// state of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Age in whole years
    pub age: u32,
    /// Completed learning milestones (quests)
    pub progress_units_completed: u32,
    /// Self-reported skill level
    #[serde(default)]
    pub skill_level: SkillLevel,
    /// Whether a parent or guardian has granted consent for social features
    #[serde(default)]
    pub parental_consent_granted: bool,
}

impl UserProfile {
    /// Create a profile with the given age and progress, no consent
    pub fn new(age: u32, progress_units_completed: u32) -> Self {
        Self {
            age,
            progress_units_completed,
            skill_level: SkillLevel::default(),
            parental_consent_granted: false,
        }
    }

    /// Set the skill level
    pub fn with_skill_level(mut self, skill_level: SkillLevel) -> Self {
        self.skill_level = skill_level;
        self
    }

    /// Set parental consent
    pub fn with_parental_consent(mut self, granted: bool) -> Self {
        self.parental_consent_granted = granted;
        self
    }

    /// Under the COPPA age threshold
    pub fn is_under_13(&self) -> bool {
        self.age < 13
    }
}
