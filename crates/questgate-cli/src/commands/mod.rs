//! Subcommand handlers.

pub mod check;
pub mod flags;
pub mod hints;
pub mod status;

use anyhow::{Context, Result};
use clap::Args;
use questgate_core::{GateConfig, SkillLevel, UserProfile};
use questgate_guards::FeatureGate;
use std::path::Path;
use tracing::debug;

/// Student profile flags shared by the evaluation commands
#[derive(Debug, Clone, Args)]
pub struct StudentArgs {
    /// Age in whole years
    #[arg(long)]
    pub age: u32,

    /// Completed quests
    #[arg(long, default_value_t = 0)]
    pub progress: u32,

    /// Parental consent has been granted
    #[arg(long)]
    pub consent: bool,

    /// Skill level: beginner, intermediate or advanced
    #[arg(long, default_value_t = SkillLevel::Beginner)]
    pub skill: SkillLevel,
}

impl StudentArgs {
    /// The profile these flags describe
    pub fn profile(&self) -> UserProfile {
        UserProfile::new(self.age, self.progress)
            .with_skill_level(self.skill)
            .with_parental_consent(self.consent)
    }
}

/// Load configuration and build a gate on the system clock
pub fn load_gate(path: &Path) -> Result<FeatureGate> {
    let config = load_config(path)?;
    debug!(
        config = %path.display(),
        overrides = config.overrides.len(),
        remote_emergency = config.emergency.endpoint.is_some(),
        "Configuration loaded"
    );
    FeatureGate::with_real_time(&config).context("failed to build feature gate")
}

/// Defaults, then `path` if it exists, then the process environment
pub fn load_config(path: &Path) -> Result<GateConfig> {
    GateConfig::load(Some(path))
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}
