//! "What unlocks next" report for the student dashboard.

use super::access::AccessEvaluator;
use questgate_core::{FeatureId, GateResult, UserProfile};
use serde::{Deserialize, Serialize};

/// One locked feature and what the student needs to unlock it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockHint {
    /// Locked feature
    pub feature: FeatureId,
    /// Human-readable requirement
    pub requirement: String,
    /// Quests still to complete; absent when the feature is age-locked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_units_remaining: Option<u32>,
}

/// Hints for every feature the evaluator currently denies
///
/// Age-locked features report the age at which they open; features the
/// student is old enough for report the remaining quests. Features denied for
/// other reasons (consent, overrides on an otherwise-met policy) are omitted.
/// Sorted by quests remaining, age-locked last, catalogue order on ties.
pub fn next_unlock_hints(evaluator: &AccessEvaluator, user: &UserProfile) -> GateResult<Vec<UnlockHint>> {
    let mut hints = Vec::new();

    for (feature, policy) in evaluator.policies().iter() {
        if evaluator.is_allowed(feature, user)? {
            continue;
        }
        if user.age < policy.min_age {
            hints.push(UnlockHint {
                feature,
                requirement: format!("Available when you turn {}", policy.min_age),
                progress_units_remaining: None,
            });
        } else if user.progress_units_completed < policy.min_progress_units {
            let remaining = policy.min_progress_units - user.progress_units_completed;
            hints.push(UnlockHint {
                feature,
                requirement: format!("Complete {remaining} more quests"),
                progress_units_remaining: Some(remaining),
            });
        }
    }

    hints.sort_by_key(|hint| hint.progress_units_remaining.unwrap_or(u32::MAX));
    Ok(hints)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::guards::{EnvOverrides, PolicyTable};

    fn evaluator() -> AccessEvaluator {
        AccessEvaluator::new(PolicyTable::shipped(), EnvOverrides::none())
    }

    #[test]
    fn reports_remaining_quests() {
        let user = UserProfile::new(14, 3).with_parental_consent(true);
        let hints = next_unlock_hints(&evaluator(), &user).unwrap();

        let assistant = hints
            .iter()
            .find(|h| h.feature == FeatureId::AiCodingAssistant);
        // ai-coding-assistant needs age 12, 5 quests
        let assistant = assistant.unwrap();
        assert_eq!(assistant.progress_units_remaining, Some(2));
        assert_eq!(assistant.requirement, "Complete 2 more quests");
    }

    #[test]
    fn age_locked_features_sort_last() {
        let user = UserProfile::new(14, 3).with_parental_consent(true);
        let hints = next_unlock_hints(&evaluator(), &user).unwrap();

        let mentor = hints.iter().find(|h| h.feature == FeatureId::MentorChat).unwrap();
        assert_eq!(mentor.requirement, "Available when you turn 15");
        assert_eq!(mentor.progress_units_remaining, None);

        let first_age_locked = hints
            .iter()
            .position(|h| h.progress_units_remaining.is_none())
            .unwrap();
        assert!(hints[first_age_locked..]
            .iter()
            .all(|h| h.progress_units_remaining.is_none()));
        let remaining: Vec<u32> = hints[..first_age_locked]
            .iter()
            .filter_map(|h| h.progress_units_remaining)
            .collect();
        assert!(remaining.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn unlocked_features_are_not_reported() {
        let user = UserProfile::new(18, 500).with_parental_consent(true);
        assert!(next_unlock_hints(&evaluator(), &user).unwrap().is_empty());
    }
}
