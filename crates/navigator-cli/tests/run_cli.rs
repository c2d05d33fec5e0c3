// navigator-cli/tests/run_cli.rs
// ============================================================================
// Module: CLI Run Integration Tests
// Description: Exercises `run()` over a real config file, store, and lock
//              path, the way an operator invocation would.
// Purpose: Guard the CLI's wiring of navigator-config, navigator-store-
//          sqlite, and navigator-scheduler together, not just each crate in
//          isolation.
// Dependencies: navigator-cli, tempfile, serde_yaml
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Integration test setup failures should panic immediately.")]

use std::io::Write;

use navigator_cli::Args;
use navigator_cli::CliError;
use navigator_cli::run;
use tempfile::NamedTempFile;

fn minimal_yaml(start_year: i32, end_year: i32) -> String {
    format!(
        "
start_year: {start_year}
end_year: {end_year}
random_seed: 42
target_growth_rate: 0.03
compensation:
  cola_rate: 0.02
  merit_budget: 0.03
workforce:
  total_termination_rate: 0.12
  new_hire_termination_rate: 0.25
enrollment:
  enrollment_rate: 0.6
threading:
  runner_threads: 1
  event_shards: 1
  max_parallel_years: 1
  parallelization:
    enabled: false
    max_workers: 1
    deterministic_execution: true
    memory_limit_mb: 2048
    enable_conditional_parallelization: false
  resource_management:
    enabled: false
    adaptive_scaling_enabled: false
    min_threads: 1
    max_threads: 1
    memory_monitoring: false
    cpu_monitoring: false
optimization:
  level: medium
  batch_size: 500
  adaptive_memory:
    enabled: true
    monitoring_interval_seconds: 1.0
    history_size: 100
    thresholds:
      moderate_mb: 2000.0
      high_mb: 3000.0
      critical_mb: 3500.0
      gc_trigger_mb: 2500.0
      fallback_trigger_mb: 3200.0
    batch_sizes:
      low: 250
      medium: 500
      high: 1000
      fallback: 100
    auto_gc_enabled: true
    fallback_enabled: true
    leak_detection_enabled: true
    leak_threshold_mb: 800.0
    leak_window_minutes: 15
    recommendation_window_minutes: 5
    min_samples_for_recommendation: 10
setup:
  clear_tables: true
  clear_mode: year
  clear_table_patterns: []
event_generation:
  mode: sql
  polars_settings:
    max_threads: 1
    batch_size: 1000
    output_path: /tmp/events
    enable_compression: false
    compression_level: 0
    max_memory_gb: 1.0
    lazy_evaluation: false
    streaming: false
    parallel_io: false
    fallback_on_error: false
    enable_profiling: false
"
    )
}

fn write_config(start_year: i32, end_year: i32) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(minimal_yaml(start_year, end_year).as_bytes()).unwrap();
    file
}

#[test]
fn an_empty_store_fails_closed_on_foundations_start_year_assertion() {
    let config_file = write_config(2025, 2025);
    let db_dir = tempfile::tempdir().unwrap();

    let args = Args {
        config: Some(config_file.path().to_path_buf()),
        start: None,
        end: None,
        resume_from_checkpoint: false,
        force_restart: false,
        fail_on_validation_error: false,
        verbose: false,
        database: db_dir.path().join("navigator.db"),
        runner_command: "true".to_string(),
    };

    let result = run(&args);
    assert!(matches!(result, Err(CliError::Orchestrator(_))));
}

#[test]
fn a_missing_config_file_fails_closed_with_a_config_error() {
    let db_dir = tempfile::tempdir().unwrap();
    let args = Args {
        config: Some(db_dir.path().join("does-not-exist.yaml")),
        start: None,
        end: None,
        resume_from_checkpoint: false,
        force_restart: false,
        fail_on_validation_error: false,
        verbose: false,
        database: db_dir.path().join("navigator.db"),
        runner_command: "true".to_string(),
    };

    let result = run(&args);
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[test]
fn a_held_lock_is_reported_as_an_orchestrator_error() {
    let config_file = write_config(2025, 2025);
    let db_dir = tempfile::tempdir().unwrap();
    let database = db_dir.path().join("navigator.db");
    let lock_path = db_dir.path().join("navigator.lock");
    std::fs::write(&lock_path, b"").unwrap();

    let args = Args {
        config: Some(config_file.path().to_path_buf()),
        start: None,
        end: None,
        resume_from_checkpoint: false,
        force_restart: false,
        fail_on_validation_error: false,
        verbose: false,
        database,
        runner_command: "true".to_string(),
    };

    let result = run(&args);
    assert!(matches!(result, Err(CliError::Orchestrator(navigator_scheduler::OrchestratorError::LockHeld))));
}

#[test]
fn force_restart_clears_a_stale_lock_before_running() {
    let config_file = write_config(2025, 2025);
    let db_dir = tempfile::tempdir().unwrap();
    let database = db_dir.path().join("navigator.db");
    let lock_path = db_dir.path().join("navigator.lock");
    std::fs::write(&lock_path, b"").unwrap();

    let args = Args {
        config: Some(config_file.path().to_path_buf()),
        start: None,
        end: None,
        resume_from_checkpoint: false,
        force_restart: true,
        fail_on_validation_error: false,
        verbose: false,
        database,
        runner_command: "true".to_string(),
    };

    // The stale lock is cleared either way; the run still fails closed on
    // the empty-foundation assertion since the runner never populates the
    // store, but it must fail for that reason rather than `LockHeld`.
    let result = run(&args);
    assert!(matches!(result, Err(CliError::Orchestrator(navigator_scheduler::OrchestratorError::Scheduler(_)))));
}
