//! `questgate flags`: evaluator answer for every feature.

use super::StudentArgs;
use anyhow::Result;
use questgate_guards::FeatureGate;

/// Print one `feature: on|off` line per registered feature
pub fn run(gate: &FeatureGate, student: &StudentArgs) -> Result<()> {
    let flags = gate.evaluate_all(&student.profile())?;
    for (feature, enabled) in flags {
        println!("{:<28} {}", feature.as_str(), if enabled { "on" } else { "off" });
    }
    Ok(())
}
