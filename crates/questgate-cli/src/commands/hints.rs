//! `questgate hints`: what unlocks next.

use super::StudentArgs;
use anyhow::Result;
use questgate_guards::FeatureGate;

/// Print unlock hints, nearest first
pub fn run(gate: &FeatureGate, student: &StudentArgs) -> Result<()> {
    let hints = gate.next_unlock_hints(&student.profile())?;
    if hints.is_empty() {
        println!("Everything is unlocked");
        return Ok(());
    }
    for hint in hints {
        println!("{:<28} {}", hint.feature.as_str(), hint.requirement);
    }
    Ok(())
}
