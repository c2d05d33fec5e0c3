// navigator-cli/src/args.rs
// ============================================================================
// Module: Command-Line Arguments
// Description: The operator-facing flag surface for a simulation run.
// Purpose: Parse and hold the subset of run parameters an operator may
//          override without editing the configuration file.
// Dependencies: clap
// ============================================================================

use std::path::PathBuf;

use clap::Parser;

/// Runs a multi-year workforce simulation.
#[derive(Debug, Parser)]
#[command(name = "navigator", version, about = "Deterministic multi-year workforce simulation runner")]
pub struct Args {
    /// Path to the simulation configuration YAML file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// First year to simulate; defaults to the configuration's `start_year`.
    #[arg(long)]
    pub start: Option<i32>,

    /// Last year to simulate, inclusive; defaults to the configuration's
    /// `end_year`.
    #[arg(long)]
    pub end: Option<i32>,

    /// Consult the recovery subsystem and resume from the latest intact
    /// checkpoint before running remaining years.
    #[arg(long)]
    pub resume_from_checkpoint: bool,

    /// Ignore a stale process lock left behind by a crashed run and force a
    /// full reset of the start year's tables.
    #[arg(long)]
    pub force_restart: bool,

    /// Abort the run as soon as a year's validation rules fold to false,
    /// rather than completing the run and leaving the failure for review.
    #[arg(long)]
    pub fail_on_validation_error: bool,

    /// Emit one structured log line per stage transition instead of only
    /// per-year summaries.
    #[arg(long)]
    pub verbose: bool,

    /// Path to the analytical store's `SQLite` database file.
    #[arg(long, default_value = "navigator.db")]
    pub database: PathBuf,

    /// Transformation command invoked for each `SQL`-mode stage, e.g. a dbt
    /// wrapper script.
    #[arg(long, default_value = "dbt")]
    pub runner_command: String,
}
