//! `questgate check`: one composite decision.

use super::StudentArgs;
use anyhow::Result;
use questgate_core::FeatureId;
use questgate_guards::{FeatureGate, GateDecision};

/// Decide `feature` for the student and print the outcome
pub async fn run(gate: &FeatureGate, feature: &str, student: &StudentArgs) -> Result<()> {
    let feature: FeatureId = feature.parse()?;
    let decision = gate.decide(feature, &student.profile()).await?;
    println!("{}", render(&decision));
    Ok(())
}

fn render(decision: &GateDecision) -> String {
    let mut out = match (&decision.denial, decision.enabled) {
        (_, true) => format!("{}: enabled", decision.feature),
        (Some(reason), false) => format!("{}: disabled ({reason})", decision.feature),
        (None, false) => format!("{}: disabled", decision.feature),
    };
    if decision.override_applied {
        out.push_str(" [operator override]");
    }
    if let Some(message) = &decision.emergency_message {
        out.push_str(&format!("\n  {message}"));
    }
    out
}
