// navigator-scheduler/src/lib.rs
// ============================================================================
// Module: Navigator Scheduler
// Description: Stage scheduler, event-generation engine, adaptive memory
//              controller, multi-year orchestrator, observability, and the
//              reporting interface.
// Purpose: Drive a multi-year simulation run from a single canonical entry
//          point, with deterministic event generation and self-healing
//          stage execution underneath it.
// Dependencies: navigator-core, navigator-providers, navigator-store-sqlite
// ============================================================================

//! ## Overview
//! This crate is the pipeline orchestration core. [`orchestrator`] is the
//! top-level entry point a caller (the CLI, a test harness) drives;
//! everything else exists to support it: [`stage`] runs one year's stages,
//! [`events`] produces that year's events, [`memory`] watches resident-set
//! size in the background, and [`observability`]/[`reporting`] turn what
//! happened into logs, summaries, and reports.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod events;
pub mod memory;
pub mod observability;
pub mod orchestrator;
pub mod reporting;
pub mod stage;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use events::BaselineEmployee;
pub use events::EnrichedEmployee;
pub use events::EventGenerationSummary;
pub use events::EventsError;
pub use events::PerformanceTier;
pub use events::VectorEventFactory;
pub use events::enrich;
pub use events::generate_events;
pub use events::level_from_compensation;
pub use events::performance_tier;
pub use memory::AdaptiveMemoryController;
pub use memory::MemoryPressure;
pub use memory::MemoryReader;
pub use memory::MemorySample;
pub use memory::Recommendation;
pub use observability::JsonLogger;
pub use observability::LogLevel;
pub use observability::LogRecord;
pub use observability::PerformanceMonitor;
pub use observability::PerformanceReport;
pub use observability::RunStatus;
pub use observability::RunSummary;
pub use observability::SummaryEntry;
pub use orchestrator::MultiYearSummary;
pub use orchestrator::OrchestratorError;
pub use orchestrator::RunLock;
pub use orchestrator::RunRequest;
pub use orchestrator::clear_mode_requires_full_reset;
pub use orchestrator::execute_multi_year_simulation;
pub use reporting::JsonReporter;
pub use reporting::NullReporter;
pub use reporting::Reporter;
pub use stage::Advisory;
pub use stage::SchedulerError;
pub use stage::StageDefinition;
pub use stage::StageName;
pub use stage::StageScheduler;
pub use stage::YearRunOutcome;
pub use stage::default_stage_graph;
