// navigator-scheduler/tests/multi_year_run.rs
// ============================================================================
// Module: Multi-Year Run Integration Tests
// Description: End-to-end checks driving the orchestrator over a real
//              `AnalyticalStore` and a no-op transformation runner.
// Purpose: Guard the full stage/orchestrator wiring, not just its parts.
// Dependencies: navigator-core, navigator-providers, navigator-scheduler,
//               navigator-store-sqlite, tempfile
// ============================================================================

//! Integration-test-only lint relaxation: this file is its own crate root,
//! and setup failures here should panic immediately rather than propagate.
#![allow(clippy::unwrap_used, reason = "Integration test setup failures should panic immediately.")]

use std::sync::Arc;
use std::time::Duration;

use navigator_core::AdaptiveMemoryConfig;
use navigator_core::ClearMode;
use navigator_core::CompensationConfig;
use navigator_core::EnrollmentConfig;
use navigator_core::EventGenerationConfig;
use navigator_core::EventGenerationMode;
use navigator_core::OptimizationConfig;
use navigator_core::OptimizationLevel;
use navigator_core::ParallelizationConfig;
use navigator_core::ResourceManagementConfig;
use navigator_core::RunId;
use navigator_core::SetupConfig;
use navigator_core::SimulationConfig;
use navigator_core::SimulationYear;
use navigator_core::ThreadingConfig;
use navigator_core::VectorModeSettings;
use navigator_core::WorkforceConfig;
use navigator_providers::ProcessRunnerConfig;
use navigator_providers::ProcessTransformationRunner;
use navigator_scheduler::AdaptiveMemoryController;
use navigator_scheduler::MemoryReader;
use navigator_scheduler::NullReporter;
use navigator_scheduler::OrchestratorError;
use navigator_scheduler::RunLock;
use navigator_scheduler::RunRequest;
use navigator_scheduler::StageScheduler;
use navigator_scheduler::execute_multi_year_simulation;
use navigator_store_sqlite::AnalyticalStore;
use navigator_store_sqlite::SqliteStoreConfig;

fn sample_config(start_year: i32, end_year: i32) -> SimulationConfig {
    SimulationConfig {
        start_year,
        end_year,
        random_seed: 7,
        target_growth_rate: 0.03,
        compensation: CompensationConfig { cola_rate: 0.02, merit_budget: 0.025 },
        workforce: WorkforceConfig { total_termination_rate: 0.12, new_hire_termination_rate: 0.25 },
        enrollment: EnrollmentConfig { enrollment_rate: 0.6 },
        threading: ThreadingConfig {
            runner_threads: 1,
            event_shards: 1,
            max_parallel_years: 1,
            parallelization: ParallelizationConfig {
                enabled: false,
                max_workers: 1,
                deterministic_execution: true,
                memory_limit_mb: 2_000,
                enable_conditional_parallelization: false,
            },
            resource_management: ResourceManagementConfig {
                enabled: false,
                adaptive_scaling_enabled: false,
                min_threads: 1,
                max_threads: 1,
                memory_monitoring: false,
                cpu_monitoring: false,
            },
        },
        optimization: OptimizationConfig { level: OptimizationLevel::Medium, batch_size: 500, adaptive_memory: AdaptiveMemoryConfig::default() },
        setup: SetupConfig { clear_tables: true, clear_mode: ClearMode::Year, clear_table_patterns: vec!["fct_%".to_string()] },
        event_generation: EventGenerationConfig {
            mode: EventGenerationMode::Sql,
            polars_settings: VectorModeSettings {
                max_threads: 1,
                batch_size: 1_000,
                output_path: "output".to_string(),
                enable_compression: false,
                compression_level: 0,
                max_memory_gb: 1.0,
                lazy_evaluation: false,
                streaming: false,
                parallel_io: false,
                fallback_on_error: false,
                enable_profiling: false,
            },
        },
    }
}

struct FixedReader;

impl MemoryReader for FixedReader {
    fn read(&self) -> (f64, f64) {
        (256.0, 8_000.0)
    }
}

fn open_store(dir: &tempfile::TempDir) -> Arc<AnalyticalStore> {
    Arc::new(AnalyticalStore::open(&SqliteStoreConfig { path: dir.path().join("navigator.db"), ..SqliteStoreConfig::default() }).unwrap())
}

fn noop_runner() -> ProcessTransformationRunner {
    ProcessTransformationRunner::new(ProcessRunnerConfig { command: "true".to_string(), timeout: Duration::from_secs(5), ..ProcessRunnerConfig::default() })
}

#[test]
fn an_empty_store_fails_closed_on_foundations_start_year_assertion() {
    // The transformation runner is a no-op here, so FOUNDATION never
    // populates `fct_workforce_snapshot`. Spec §4.9's self-healing
    // assertion treats that as fatal in the start year rather than
    // silently proceeding on an empty baseline.
    let db_dir = tempfile::tempdir().unwrap();
    let lock_dir = tempfile::tempdir().unwrap();
    let store = open_store(&db_dir);
    let scheduler = StageScheduler::new(noop_runner(), Arc::clone(&store)).unwrap();

    let config = sample_config(2025, 2026);
    let request = RunRequest {
        config: &config,
        start_year: SimulationYear::new(config.start_year),
        end_year: SimulationYear::new(config.end_year),
        resume_from_checkpoint: false,
        fail_on_validation_error: false,
        lock_path: lock_dir.path().join("navigator.lock"),
        run_id: RunId::new("test-run"),
    };

    let mut memory = AdaptiveMemoryController::start(AdaptiveMemoryConfig::default(), Arc::new(FixedReader));
    let mut reporter = NullReporter;

    let result = execute_multi_year_simulation(&request, &scheduler, &store, &mut memory, &mut reporter);
    assert!(matches!(result, Err(OrchestratorError::Scheduler(_))));
}

#[test]
fn a_second_run_holding_the_same_lock_path_is_rejected() {
    let db_dir = tempfile::tempdir().unwrap();
    let lock_dir = tempfile::tempdir().unwrap();
    let lock_path = lock_dir.path().join("navigator.lock");

    let _held = RunLock::acquire(&lock_path).unwrap();

    let store = open_store(&db_dir);
    let scheduler = StageScheduler::new(noop_runner(), Arc::clone(&store)).unwrap();
    let config = sample_config(2025, 2025);
    let request = RunRequest {
        config: &config,
        start_year: SimulationYear::new(config.start_year),
        end_year: SimulationYear::new(config.end_year),
        resume_from_checkpoint: false,
        fail_on_validation_error: false,
        lock_path,
        run_id: RunId::new("test-run-2"),
    };
    let mut memory = AdaptiveMemoryController::start(AdaptiveMemoryConfig::default(), Arc::new(FixedReader));
    let mut reporter = NullReporter;

    let result = execute_multi_year_simulation(&request, &scheduler, &store, &mut memory, &mut reporter);
    assert!(matches!(result, Err(OrchestratorError::LockHeld)));
}
