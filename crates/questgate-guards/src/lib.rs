#![deny(clippy::await_holding_lock)]
//! # Questgate Guards - layered feature gate
//!
//! Decides whether a student may use a platform feature right now. Three
//! layers run in order and the first refusal wins:
//!
//! 1. emergency override (maintenance mode, operator disable list), cached
//!    and failing open
//! 2. access evaluator (operator overrides, COPPA, age, progress, consent)
//! 3. per-feature circuit breaker fed by [`FeatureGate::record_outcome`]
//!
//! ```ignore
//! let gate = FeatureGate::with_real_time(&GateConfig::load(None)?)?;
//! if gate.is_enabled(FeatureId::CodingHints, &user).await? {
//!     let ok = run_hints().await.is_ok();
//!     gate.record_outcome(FeatureId::CodingHints, ok);
//! }
//! ```

#![forbid(unsafe_code)]

pub mod guards;
pub mod prelude;

pub use guards::*;
