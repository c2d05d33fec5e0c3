// navigator-core/src/lib.rs
// ============================================================================
// Module: Navigator Core Library
// Description: Public API surface for the simulation data model and primitives.
// Purpose: Expose identifiers, deterministic RNG, hashing, the employee and
//          event data model, registries, checkpoints, configuration, and
//          validation rule primitives shared by every other crate.
// Dependencies: crate::{identifiers, rng, hashing, employee, event, registry,
//          checkpoint, config, validation}
// ============================================================================

//! ## Overview
//! Navigator Core has no knowledge of SQLite, YAML files, or process
//! scheduling; it defines the data the rest of the workspace operates on
//! and the pure functions (RNG draws, canonical hashing, validation rule
//! evaluation) that must behave identically regardless of which crate
//! calls them.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod checkpoint;
pub mod config;
pub mod employee;
pub mod event;
pub mod hashing;
pub mod identifiers;
pub mod registry;
pub mod rng;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use checkpoint::Checkpoint;
pub use checkpoint::DatabaseState;
pub use checkpoint::StageCheckpoint;
pub use checkpoint::ValidationData;

pub use config::AdaptiveMemoryConfig;
pub use config::BatchSizes;
pub use config::ClearMode;
pub use config::CompensationConfig;
pub use config::ConfigError;
pub use config::EnrollmentConfig;
pub use config::EventGenerationConfig;
pub use config::EventGenerationMode;
pub use config::MemoryThresholds;
pub use config::OptimizationConfig;
pub use config::OptimizationLevel;
pub use config::ParallelizationConfig;
pub use config::ResourceManagementConfig;
pub use config::SetupConfig;
pub use config::SimulationConfig;
pub use config::ThreadingConfig;
pub use config::VectorModeSettings;
pub use config::WorkforceConfig;

pub use employee::EmploymentStatus;
pub use employee::SnapshotError;
pub use employee::WorkforceSnapshot;
pub use employee::is_compensation_change_within_bounds;
pub use employee::is_forbidden_resurrection;

pub use event::Event;
pub use event::EventType;
pub use event::GenerationMethod;
pub use event::sort_and_check_uniqueness;

pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;

pub use identifiers::EmployeeId;
pub use identifiers::EventId;
pub use identifiers::PlanDesignId;
pub use identifiers::RunId;
pub use identifiers::ScenarioId;
pub use identifiers::SimulationYear;

pub use registry::DeferralEscalationRegistryEntry;
pub use registry::EnrollmentRegistryEntry;

pub use rng::DrawEntry;
pub use rng::DrawTable;
pub use rng::Stream;
pub use rng::draw;

pub use validation::EventSequenceRule;
pub use validation::EventSpikeRule;
pub use validation::HireTerminationRatioRule;
pub use validation::RowCountDriftRule;
pub use validation::SequencePoint;
pub use validation::Severity;
pub use validation::ValidationOutcome;
pub use validation::ValidationRule;
pub use validation::year_passes;
