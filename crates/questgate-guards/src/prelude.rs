//! Questgate prelude.
//!
//! Curated re-exports for callers that only need the composite gate.

pub use crate::guards::chain::{DenialReason, FeatureGate, GateDecision};
pub use crate::guards::emergency::EmergencyConfigSource;
pub use crate::guards::hints::UnlockHint;
pub use questgate_core::{
    EmergencyConfig, FeatureId, GateConfig, GateError, GateResult, SkillLevel, UserProfile,
};
