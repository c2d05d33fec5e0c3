// navigator-config/src/config.rs
// ============================================================================
// Module: Simulation Configuration Loader
// Description: Strict, fail-closed YAML loading for SimulationConfig.
// Purpose: Resolve a config path, bound its size, parse it, and validate it
//          before a run ever sees it.
// Dependencies: navigator-core, serde_yaml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a YAML file with strict size and path
//! limits. Missing, oversized, or invalid configuration fails closed rather
//! than falling back to defaults, so a malformed run never starts silently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use navigator_core::ConfigError as ValidationError;
use navigator_core::SimulationConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "navigator.yaml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "NAVIGATOR_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A configuration-loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading the configuration file.
    #[error("config io error: {0}")]
    Io(String),
    /// YAML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The resolved path or its contents violated a size/shape limit.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The parsed configuration failed its own invariant checks.
    #[error("config failed validation: {0}")]
    Validation(#[from] ValidationError),
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Loads and validates a [`SimulationConfig`] from a YAML file.
///
/// Resolution order: an explicit `path`, then the `NAVIGATOR_CONFIG`
/// environment variable, then `navigator.yaml` in the current directory.
///
/// # Errors
///
/// Returns [`ConfigError`] if the path cannot be read, exceeds
/// [`MAX_CONFIG_FILE_SIZE`], fails to parse as YAML, or fails
/// [`SimulationConfig::validate`].
pub fn load_simulation_config(path: Option<&Path>) -> Result<SimulationConfig, ConfigError> {
    let resolved = resolve_path(path)?;
    validate_path(&resolved)?;
    let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
    let config: SimulationConfig =
        serde_yaml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Resolves the config path from an explicit argument, the environment, or
/// the default filename, in that order.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits before it is read.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only setup failures are reported via expect, not propagated."
    )]

    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn minimal_yaml() -> &'static str {
        "
start_year: 2025
end_year: 2027
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
  runner_threads: 4
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
    max_threads: 4
    memory_monitoring: true
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
  clear_tables: false
  clear_mode: year
  clear_table_patterns: []
event_generation:
  mode: sql
  polars_settings:
    max_threads: 4
    batch_size: 10000
    output_path: /tmp/events
    enable_compression: false
    compression_level: 0
    max_memory_gb: 4.0
    lazy_evaluation: true
    streaming: false
    parallel_io: false
    fallback_on_error: true
    enable_profiling: false
"
    }

    #[test]
    fn loads_a_well_formed_document() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(minimal_yaml().as_bytes()).expect("write");
        let config = load_simulation_config(Some(file.path())).expect("load");
        assert_eq!(config.start_year, 2025);
        assert_eq!(config.end_year, 2027);
    }

    #[test]
    fn rejects_an_inverted_year_range() {
        let mut file = NamedTempFile::new().expect("tempfile");
        let broken = minimal_yaml().replace("start_year: 2025", "start_year: 2030");
        file.write_all(broken.as_bytes()).expect("write");
        let result = load_simulation_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_a_missing_file() {
        let result = load_simulation_config(Some(Path::new("/nonexistent/navigator.yaml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn rejects_an_oversized_path() {
        let long_component = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let path = PathBuf::from(long_component);
        let result = load_simulation_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
