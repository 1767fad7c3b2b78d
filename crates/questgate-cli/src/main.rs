//! Operator CLI for the questgate feature gate
//!
//! Evaluates features for a hypothetical student, lists unlock hints and
//! prints the emergency and breaker status. Configuration is layered the same
//! way the platform loads it: built-in defaults, then the TOML file if
//! present, then environment variables.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{check, flags, hints, status, StudentArgs};

#[derive(Parser)]
#[command(name = "questgate")]
#[command(about = "Questgate - feature gates and circuit breakers for the learning platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "questgate.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide one feature for one student
    Check {
        /// Feature identifier, e.g. coding-hints
        #[arg(short, long)]
        feature: String,

        #[command(flatten)]
        student: StudentArgs,
    },

    /// Evaluator result for every feature
    Flags {
        #[command(flatten)]
        student: StudentArgs,
    },

    /// Locked features and what unlocks them
    Hints {
        #[command(flatten)]
        student: StudentArgs,
    },

    /// Emergency configuration and breaker snapshot
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let gate = commands::load_gate(&cli.config)?;

    match cli.command {
        Commands::Check { feature, student } => {
            check::run(&gate, &feature, &student).await?;
        }
        Commands::Flags { student } => {
            flags::run(&gate, &student)?;
        }
        Commands::Hints { student } => {
            hints::run(&gate, &student)?;
        }
        Commands::Status => {
            status::run(&gate).await?;
        }
    }

    Ok(())
}
