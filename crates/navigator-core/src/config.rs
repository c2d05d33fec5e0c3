// navigator-core/src/config.rs
// ============================================================================
// Module: Simulation Configuration
// Description: The immutable configuration for a single simulation run.
// Purpose: Define the config shape and its validation/hashing; YAML loading
//          lives in `navigator-config`.
// Dependencies: serde, crate::hashing
// ============================================================================

//! ## Overview
//! `SimulationConfig` is constructed once per run and never mutated. Its
//! `config_hash` is compared against the `config_hash` stored in a
//! checkpoint to detect configuration drift before a resume is allowed.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::hashing::HashDigest;
use crate::hashing::hash_canonical_json;

/// Event-generation mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventGenerationMode {
    /// Runs the transformation runner, optionally sharded.
    Sql,
    /// Runs the in-process vectorized event factory.
    Vector,
}

/// Full-reset policy applied before `FOUNDATION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearMode {
    /// Reset every tracked table before the run.
    All,
    /// Clear only the current year's partitions.
    Year,
}

/// Optimization level, mirrored by the adaptive memory controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    /// Smallest batches, most frequent GC; the most conservative level.
    Fallback,
    /// Reduced batch size, used under `HIGH` memory pressure.
    Low,
    /// The default, balanced level.
    Medium,
    /// Largest batches; used when memory pressure is `LOW`.
    High,
}

/// Compensation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompensationConfig {
    /// Cost-of-living adjustment rate, `[0, 1]`.
    pub cola_rate: f64,
    /// Merit budget as a fraction of payroll, `[0, 1]`.
    pub merit_budget: f64,
}

/// Workforce termination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkforceConfig {
    /// Baseline annual termination rate, `[0, 1]`.
    pub total_termination_rate: f64,
    /// Termination rate applied to employees hired within the last 12
    /// months, `[0, 1]`.
    pub new_hire_termination_rate: f64,
}

/// Enrollment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentConfig {
    /// Baseline annual enrollment rate among eligible, unenrolled employees.
    pub enrollment_rate: f64,
}

/// Parallelization sub-settings under `orchestrator.threading`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParallelizationConfig {
    /// Whether model-level parallelism is enabled at all.
    pub enabled: bool,
    /// Maximum worker count when parallelism is enabled.
    pub max_workers: usize,
    /// Serialize equivalence-class execution order for reproducibility.
    pub deterministic_execution: bool,
    /// Memory ceiling in MB for the parallel execution pool.
    pub memory_limit_mb: u64,
    /// Whether a safety validator must certify a model subset before it
    /// may run in parallel.
    pub enable_conditional_parallelization: bool,
}

/// Resource management sub-settings under `orchestrator.threading`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceManagementConfig {
    /// Whether adaptive thread scaling is enabled.
    pub enabled: bool,
    /// Whether thread count adapts to observed load.
    pub adaptive_scaling_enabled: bool,
    /// Minimum thread count.
    pub min_threads: usize,
    /// Maximum thread count.
    pub max_threads: usize,
    /// Whether memory is actively monitored.
    pub memory_monitoring: bool,
    /// Whether CPU utilization is actively monitored.
    pub cpu_monitoring: bool,
}

/// Threading configuration under `orchestrator.threading`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreadingConfig {
    /// Threads available to the transformation runner.
    pub runner_threads: usize,
    /// Number of shards to split `EVENT_GENERATION` across in SQL mode.
    pub event_shards: usize,
    /// Maximum number of simulation years that may run concurrently. The
    /// orchestrator never actually parallelizes years (spec §5: "year N
    /// starts only after year N-1 has fully completed"); this bounds a
    /// future capability and is validated but otherwise unused today.
    pub max_parallel_years: usize,
    /// Model-level parallelization policy.
    pub parallelization: ParallelizationConfig,
    /// Resource management policy.
    pub resource_management: ResourceManagementConfig,
}

/// Memory pressure thresholds, in MB. Defaults match the legacy system's
/// tuned values for simulation workloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryThresholds {
    /// RSS at or above this level is at least `MODERATE` pressure.
    pub moderate_mb: f64,
    /// RSS at or above this level is at least `HIGH` pressure.
    pub high_mb: f64,
    /// RSS at or above this level is `CRITICAL` pressure.
    pub critical_mb: f64,
    /// RSS at or above this level forces a GC/compaction pass.
    pub gc_trigger_mb: f64,
    /// RSS at or above this level, combined with `CRITICAL` pressure,
    /// engages `FALLBACK`.
    pub fallback_trigger_mb: f64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            moderate_mb: 2_000.0,
            high_mb: 3_000.0,
            critical_mb: 3_500.0,
            gc_trigger_mb: 2_500.0,
            fallback_trigger_mb: 3_200.0,
        }
    }
}

/// Batch size per optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchSizes {
    /// Batch size at `LOW` optimization.
    pub low: usize,
    /// Batch size at `MEDIUM` optimization.
    pub medium: usize,
    /// Batch size at `HIGH` optimization.
    pub high: usize,
    /// Batch size at `FALLBACK` optimization.
    pub fallback: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            low: 250,
            medium: 500,
            high: 1_000,
            fallback: 100,
        }
    }
}

impl BatchSizes {
    /// Returns the batch size for a given optimization level.
    #[must_use]
    pub const fn for_level(self, level: OptimizationLevel) -> usize {
        match level {
            OptimizationLevel::Low => self.low,
            OptimizationLevel::Medium => self.medium,
            OptimizationLevel::High => self.high,
            OptimizationLevel::Fallback => self.fallback,
        }
    }
}

/// Adaptive memory controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveMemoryConfig {
    /// Whether the adaptive memory controller runs at all.
    pub enabled: bool,
    /// Sampling interval for the background sampler.
    pub monitoring_interval_seconds: f64,
    /// Number of samples retained for recommendation analysis.
    pub history_size: usize,
    /// Pressure thresholds.
    pub thresholds: MemoryThresholds,
    /// Batch sizes per optimization level.
    pub batch_sizes: BatchSizes,
    /// Whether crossing `gc_trigger_mb` forces a GC/compaction pass.
    pub auto_gc_enabled: bool,
    /// Whether `CRITICAL` pressure may engage `FALLBACK`.
    pub fallback_enabled: bool,
    /// Whether the leak heuristic runs.
    pub leak_detection_enabled: bool,
    /// Growth over the leak window, in MB, required to suspect a leak.
    pub leak_threshold_mb: f64,
    /// Rolling window, in minutes, the leak heuristic evaluates.
    pub leak_window_minutes: u32,
    /// Cadence, in minutes, at which recommendations are (re-)emitted.
    pub recommendation_window_minutes: u32,
    /// Minimum samples required before a recommendation may be emitted.
    pub min_samples_for_recommendation: usize,
}

impl Default for AdaptiveMemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            monitoring_interval_seconds: 1.0,
            history_size: 100,
            thresholds: MemoryThresholds::default(),
            batch_sizes: BatchSizes::default(),
            auto_gc_enabled: true,
            fallback_enabled: true,
            leak_detection_enabled: true,
            leak_threshold_mb: 800.0,
            leak_window_minutes: 15,
            recommendation_window_minutes: 5,
            min_samples_for_recommendation: 10,
        }
    }
}

/// Optimization configuration, including the adaptive memory controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Starting optimization level.
    pub level: OptimizationLevel,
    /// Starting batch size, independent of the per-level defaults.
    pub batch_size: usize,
    /// Adaptive memory controller configuration.
    pub adaptive_memory: AdaptiveMemoryConfig,
}

/// Setup/reset policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Whether to clear tables at all before the run.
    pub clear_tables: bool,
    /// Scope of the clear: all years, or only the current one.
    pub clear_mode: ClearMode,
    /// Table name glob patterns eligible for a per-year clear.
    pub clear_table_patterns: Vec<String>,
}

/// Polars-style vector-mode event-generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorModeSettings {
    /// Worker threads available to the vectorized engine.
    pub max_threads: usize,
    /// Row batch size for vectorized operations.
    pub batch_size: usize,
    /// Output directory for year-partitioned event files.
    pub output_path: String,
    /// Whether output files are compressed.
    pub enable_compression: bool,
    /// Compression level, algorithm-defined.
    pub compression_level: u32,
    /// Soft memory ceiling for the vectorized engine, in GB.
    pub max_memory_gb: f64,
    /// Whether to defer computation until output is requested.
    pub lazy_evaluation: bool,
    /// Whether to stream rather than materialize whole frames.
    pub streaming: bool,
    /// Whether file I/O may run in parallel with computation.
    pub parallel_io: bool,
    /// Whether a vector-mode failure falls back to SQL mode.
    pub fallback_on_error: bool,
    /// Whether to record per-stage timing for the vectorized engine.
    pub enable_profiling: bool,
}

/// Event-generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGenerationConfig {
    /// SQL or vector mode.
    pub mode: EventGenerationMode,
    /// Vector-mode-specific settings, present regardless of `mode` so a
    /// fallback from vector to SQL mode has a concrete settings source.
    pub polars_settings: VectorModeSettings,
}

/// The immutable configuration for a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// First year to simulate, inclusive.
    pub start_year: i32,
    /// Last year to simulate, inclusive.
    pub end_year: i32,
    /// Seed for the deterministic RNG.
    pub random_seed: u64,
    /// Target year-over-year workforce growth rate.
    pub target_growth_rate: f64,
    /// Compensation parameters.
    pub compensation: CompensationConfig,
    /// Workforce termination parameters.
    pub workforce: WorkforceConfig,
    /// Enrollment parameters.
    pub enrollment: EnrollmentConfig,
    /// Threading and parallelization configuration.
    pub threading: ThreadingConfig,
    /// Optimization and adaptive memory configuration.
    pub optimization: OptimizationConfig,
    /// Setup/reset policy.
    pub setup: SetupConfig,
    /// Event-generation configuration.
    pub event_generation: EventGenerationConfig,
}

/// A configuration invariant violation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// `start_year` is after `end_year`.
    #[error("start_year {start_year} is after end_year {end_year}")]
    InvertedYearRange {
        /// The offending start year.
        start_year: i32,
        /// The offending end year.
        end_year: i32,
    },
    /// A rate field fell outside `[0, 1]`.
    #[error("{field} must be within [0, 1], got {value}")]
    RateOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The offending value.
        value: f64,
    },
    /// `threading.event_shards` was zero.
    #[error("threading.event_shards must be at least 1")]
    ZeroEventShards,
}

impl SimulationConfig {
    /// Validates the invariants from spec §3: `start_year <= end_year`,
    /// all rates in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_year > self.end_year {
            return Err(ConfigError::InvertedYearRange {
                start_year: self.start_year,
                end_year: self.end_year,
            });
        }
        let rates: [(&'static str, f64); 6] = [
            ("target_growth_rate", self.target_growth_rate),
            ("compensation.cola_rate", self.compensation.cola_rate),
            ("compensation.merit_budget", self.compensation.merit_budget),
            ("workforce.total_termination_rate", self.workforce.total_termination_rate),
            ("workforce.new_hire_termination_rate", self.workforce.new_hire_termination_rate),
            ("enrollment.enrollment_rate", self.enrollment.enrollment_rate),
        ];
        for (field, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { field, value });
            }
        }
        if self.threading.event_shards == 0 {
            return Err(ConfigError::ZeroEventShards);
        }
        Ok(())
    }

    /// Computes the stable configuration hash used to detect drift between
    /// a checkpoint and a new run.
    ///
    /// # Errors
    ///
    /// Returns a canonicalization error if the configuration fails to
    /// serialize, which cannot happen for this plain-data type but is
    /// propagated rather than assumed away.
    pub fn config_hash(&self) -> Result<HashDigest, crate::hashing::HashError> {
        hash_canonical_json(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SimulationConfig {
        SimulationConfig {
            start_year: 2025,
            end_year: 2027,
            random_seed: 42,
            target_growth_rate: 0.03,
            compensation: CompensationConfig {
                cola_rate: 0.02,
                merit_budget: 0.025,
            },
            workforce: WorkforceConfig {
                total_termination_rate: 0.12,
                new_hire_termination_rate: 0.25,
            },
            enrollment: EnrollmentConfig { enrollment_rate: 0.6 },
            threading: ThreadingConfig {
                runner_threads: 4,
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
                    max_threads: 4,
                    memory_monitoring: true,
                    cpu_monitoring: false,
                },
            },
            optimization: OptimizationConfig {
                level: OptimizationLevel::Medium,
                batch_size: 500,
                adaptive_memory: AdaptiveMemoryConfig::default(),
            },
            setup: SetupConfig {
                clear_tables: true,
                clear_mode: ClearMode::Year,
                clear_table_patterns: vec!["fct_%".to_string()],
            },
            event_generation: EventGenerationConfig {
                mode: EventGenerationMode::Vector,
                polars_settings: VectorModeSettings {
                    max_threads: 4,
                    batch_size: 10_000,
                    output_path: "output".to_string(),
                    enable_compression: true,
                    compression_level: 3,
                    max_memory_gb: 4.0,
                    lazy_evaluation: true,
                    streaming: true,
                    parallel_io: true,
                    fallback_on_error: true,
                    enable_profiling: false,
                },
            },
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        let mut config = valid_config();
        config.start_year = 2030;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedYearRange {
                start_year: 2030,
                end_year: 2027
            })
        );
    }

    #[test]
    fn out_of_range_rate_is_rejected() {
        let mut config = valid_config();
        config.target_growth_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_hash_is_stable_and_sensitive_to_changes() {
        let config = valid_config();
        let first = config.config_hash().expect("hash");
        let second = config.config_hash().expect("hash");
        assert_eq!(first, second);

        let mut changed = config;
        changed.compensation.merit_budget = 0.030;
        let third = changed.config_hash().expect("hash");
        assert_ne!(first, third);
    }
}
