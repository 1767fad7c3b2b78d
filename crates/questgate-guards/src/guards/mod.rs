//! Gate layers and their composition.

pub mod access;
pub mod breaker;
pub mod chain;
pub mod emergency;
pub mod hints;
pub mod overrides;
pub mod policy;

pub use access::{AccessDecision, AccessDenial, AccessEvaluator};
pub use breaker::{BreakerRegistry, BreakerSnapshot, BreakerState, CircuitState, ISSUE_ERROR_RATE};
pub use chain::{DenialReason, FeatureGate, GateDecision};
pub use emergency::{
    EmergencyConfigSource, EmergencyLayer, EnvEmergencySource, HttpEmergencySource,
    StaticEmergencySource,
};
pub use hints::{next_unlock_hints, UnlockHint};
pub use overrides::EnvOverrides;
pub use policy::PolicyTable;
