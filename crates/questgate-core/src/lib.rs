//! Questgate Core - feature catalogue and shared types
//!
//! Foundation for the questgate feature gate: the closed set of gated
//! platform features, the student profile supplied with each evaluation,
//! the static access and breaker tables, the emergency kill-switch document,
//! the unified error type, time effects, and startup configuration.
//!
//! Nothing in this crate performs I/O except [`GateConfig::load`], which runs
//! once at process start.

#![forbid(unsafe_code)]

/// Startup configuration (defaults, TOML file, environment)
pub mod config;

/// Emergency kill-switch document
pub mod emergency;

/// Unified error handling
pub mod errors;

/// Feature catalogue
pub mod feature;

/// Access policies and breaker thresholds
pub mod policy;

/// Physical time effects
pub mod time;

/// Student profiles
pub mod user;

pub use config::{EmergencySettings, GateConfig};
pub use emergency::{EmergencyConfig, EmergencyConfigWire};
pub use errors::{GateError, Result as GateResult};
pub use feature::FeatureId;
pub use policy::{AccessPolicy, BreakerConfig};
pub use time::{PhysicalTime, PhysicalTimeEffects, RealTimeHandler, SimulatedTimeHandler};
pub use user::{SkillLevel, UserProfile};
