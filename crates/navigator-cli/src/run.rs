// navigator-cli/src/run.rs
// ============================================================================
// Module: Run Entry Point
// Description: Wires parsed arguments into a single orchestrator call.
// Purpose: Keep `main` a thin parse-and-dispatch shell; this is where the
//          CLI's actual behavior lives and is tested.
// Dependencies: navigator-config, navigator-core, navigator-providers,
//               navigator-scheduler, navigator-store-sqlite
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use navigator_config::ConfigError;
use navigator_core::RunId;
use navigator_core::SimulationYear;
use navigator_providers::ProcessRunnerConfig;
use navigator_providers::ProcessTransformationRunner;
use navigator_scheduler::AdaptiveMemoryController;
use navigator_scheduler::JsonReporter;
use navigator_scheduler::MultiYearSummary;
use navigator_scheduler::OrchestratorError;
use navigator_scheduler::RunRequest;
use navigator_scheduler::SchedulerError;
use navigator_scheduler::StageScheduler;
use navigator_scheduler::execute_multi_year_simulation;
use navigator_store_sqlite::AnalyticalStore;
use navigator_store_sqlite::SqliteStoreConfig;
use navigator_store_sqlite::StoreError;
use navigator_store_sqlite::unix_millis;
use serde_json::Value;
use thiserror::Error;

use crate::args::Args;
use crate::memory_reader::ProcMemoryReader;

/// The result of a completed run: the orchestrator's summary plus one JSON
/// report per completed year, left for the caller to render.
#[derive(Debug)]
pub struct RunOutcome {
    /// The multi-year summary returned by the orchestrator.
    pub summary: MultiYearSummary,
    /// One JSON report per completed year, in order.
    pub year_reports: Vec<Value>,
}

/// A failure at any point in loading configuration, opening the store, or
/// running the simulation.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The analytical store could not be opened or a store operation
    /// failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The scheduler could not be constructed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// The multi-year run failed.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// The database directory could not be created.
    #[error("failed to create database directory: {0}")]
    Io(String),
}

/// Loads configuration, opens the store, and drives one multi-year run to
/// completion, returning the run's summary on success.
///
/// # Errors
///
/// Returns [`CliError`] if the configuration cannot be loaded, the store
/// cannot be opened, or the run fails in a way the scheduler could not
/// self-heal.
pub fn run(args: &Args) -> Result<RunOutcome, CliError> {
    let config = navigator_config::load_simulation_config(args.config.as_deref())?;

    let start_year = SimulationYear::new(args.start.unwrap_or(config.start_year));
    let end_year = SimulationYear::new(args.end.unwrap_or(config.end_year));

    if let Some(parent) = args.database.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| CliError::Io(err.to_string()))?;
    }

    let store = Arc::new(AnalyticalStore::open(&SqliteStoreConfig { path: args.database.clone(), ..SqliteStoreConfig::default() })?);

    let runner = ProcessTransformationRunner::new(ProcessRunnerConfig {
        command: args.runner_command.clone(),
        timeout: Duration::from_secs(600),
        ..ProcessRunnerConfig::default()
    });
    let scheduler = StageScheduler::new(runner, Arc::clone(&store))?;

    let mut memory = AdaptiveMemoryController::start(config.optimization.adaptive_memory.clone(), Arc::new(ProcMemoryReader));
    let mut reporter = JsonReporter::default();

    let lock_path = lock_path_for(&args.database);
    if args.force_restart {
        let _ = fs::remove_file(&lock_path);
    }

    let config_hash = config.config_hash().map_err(|err| CliError::Orchestrator(OrchestratorError::ConfigHash(err.to_string())))?;
    let run_id = RunId::new(format!("run-{}-{}", config_hash.as_str(), unix_millis()));

    let request = RunRequest {
        config: &config,
        start_year,
        end_year,
        resume_from_checkpoint: args.resume_from_checkpoint && !args.force_restart,
        fail_on_validation_error: args.fail_on_validation_error,
        lock_path,
        run_id,
    };

    let summary = execute_multi_year_simulation(&request, &scheduler, &store, &mut memory, &mut reporter)?;
    Ok(RunOutcome { summary, year_reports: reporter.year_reports })
}

fn lock_path_for(database: &Path) -> PathBuf {
    match database.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => parent.join("navigator.lock"),
        None => PathBuf::from("navigator.lock"),
    }
}
