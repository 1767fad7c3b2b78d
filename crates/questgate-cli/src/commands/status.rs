//! `questgate status`: emergency configuration and breaker health.

use anyhow::Result;
use questgate_core::EmergencyConfig;
use questgate_guards::{BreakerSnapshot, FeatureGate};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    emergency: EmergencyConfig,
    features_with_issues: usize,
    breakers: Vec<BreakerSnapshot>,
}

/// Print the current status as JSON
pub async fn run(gate: &FeatureGate) -> Result<()> {
    let report = StatusReport {
        emergency: gate.current_emergency_config().await,
        features_with_issues: gate.features_with_issues(),
        breakers: gate.breaker_snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
