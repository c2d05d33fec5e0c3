// navigator-scheduler/src/memory.rs
// ============================================================================
// Module: Adaptive Memory Controller
// Description: Samples resident-set size and mutates the run's batch size
//              and optimization level in response to memory pressure.
// Purpose: Keep a multi-year run inside its memory budget without an
//          operator watching it.
// Dependencies: navigator-core, std::thread
// ============================================================================

//! ## Overview
//! A single background thread samples RSS on a fixed interval, classifies
//! pressure against the configured thresholds, and mutates shared
//! optimization-level state through an atomic so the orchestrator's hot
//! path never blocks on a lock. History and recommendations are read back
//! by the orchestrator at year boundaries and at run end.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use navigator_core::AdaptiveMemoryConfig;
use navigator_core::OptimizationLevel;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Classified memory pressure, from spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    /// Below `moderate_mb` and available memory is ample.
    Low,
    /// At or above `moderate_mb`, or available memory below 2 GiB.
    Moderate,
    /// At or above `high_mb`, or available memory below 1 GiB.
    High,
    /// At or above `critical_mb`, or available memory below 500 MiB.
    Critical,
}

/// Reads current resident-set size and available memory, in MB. A test
/// double can substitute a fixed sequence; production wires this to the
/// host's own memory accounting.
pub trait MemoryReader: Send + Sync {
    /// Returns `(rss_mb, available_mb)`.
    fn read(&self) -> (f64, f64);
}

/// One sample taken by the background sampler.
#[derive(Debug, Clone, Copy)]
pub struct MemorySample {
    /// Resident-set size, in MB, at sample time.
    pub rss_mb: f64,
    /// Available system memory, in MB, at sample time.
    pub available_mb: f64,
    /// Classified pressure for this sample.
    pub pressure: MemoryPressure,
    /// Monotonic sample index since the controller started.
    pub sequence: u64,
}

/// An advisory recommendation emitted by the cadence-based analyzer.
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    /// RSS has stayed at `HIGH` or `CRITICAL` pressure for the whole window.
    SustainedHighMemory,
    /// GC/compaction has fired more than once in the window.
    FrequentGc,
    /// The controller has been at `FALLBACK` for the whole window.
    PermanentFallback,
    /// The leak heuristic's conditions were all satisfied.
    SuspectedLeak {
        /// Growth observed over the leak window, in MB.
        growth_mb: f64,
    },
}

/// Classifies pressure from RSS and available memory against thresholds.
fn classify(rss_mb: f64, available_mb: f64, config: &AdaptiveMemoryConfig) -> MemoryPressure {
    let thresholds = &config.thresholds;
    if rss_mb >= thresholds.critical_mb || available_mb < 500.0 {
        MemoryPressure::Critical
    } else if rss_mb >= thresholds.high_mb || available_mb < 1_024.0 {
        MemoryPressure::High
    } else if rss_mb >= thresholds.moderate_mb || available_mb < 2_048.0 {
        MemoryPressure::Moderate
    } else {
        MemoryPressure::Low
    }
}

/// Maps a pressure transition to the optimization-level action from spec
/// §4.7: `HIGH` drops to `LOW`; `CRITICAL` drops to `FALLBACK` only once
/// `fallback_trigger_mb` is also crossed, otherwise `LOW`; a return to
/// `LOW` pressure restores `HIGH`.
fn level_for_transition(pressure: MemoryPressure, rss_mb: f64, config: &AdaptiveMemoryConfig) -> Option<OptimizationLevel> {
    match pressure {
        MemoryPressure::Low => Some(OptimizationLevel::High),
        MemoryPressure::High => Some(OptimizationLevel::Low),
        MemoryPressure::Critical => {
            if config.fallback_enabled && rss_mb >= config.thresholds.fallback_trigger_mb {
                Some(OptimizationLevel::Fallback)
            } else {
                Some(OptimizationLevel::Low)
            }
        }
        MemoryPressure::Moderate => None,
    }
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Encodes [`OptimizationLevel`] into a single byte for atomic storage.
const fn level_to_byte(level: OptimizationLevel) -> u8 {
    match level {
        OptimizationLevel::Fallback => 0,
        OptimizationLevel::Low => 1,
        OptimizationLevel::Medium => 2,
        OptimizationLevel::High => 3,
    }
}

/// Renders a pressure classification as the string stored in the exported
/// memory profile.
const fn pressure_str(pressure: MemoryPressure) -> &'static str {
    match pressure {
        MemoryPressure::Low => "low",
        MemoryPressure::Moderate => "moderate",
        MemoryPressure::High => "high",
        MemoryPressure::Critical => "critical",
    }
}

/// Renders a recommendation as the string stored in the exported memory
/// profile.
fn recommendation_str(rec: &Recommendation) -> String {
    match rec {
        Recommendation::SustainedHighMemory => "sustained_high_memory".to_string(),
        Recommendation::FrequentGc => "frequent_gc".to_string(),
        Recommendation::PermanentFallback => "permanent_fallback".to_string(),
        Recommendation::SuspectedLeak { growth_mb } => format!("suspected_leak(growth_mb={growth_mb})"),
    }
}

/// Decodes a byte written by [`level_to_byte`] back into an
/// [`OptimizationLevel`], defaulting to `Medium` for an unrecognized value
/// (never produced by this module, but `from_bits`-style decoding should
/// not panic on garbage).
const fn byte_to_level(byte: u8) -> OptimizationLevel {
    match byte {
        0 => OptimizationLevel::Fallback,
        1 => OptimizationLevel::Low,
        3 => OptimizationLevel::High,
        _ => OptimizationLevel::Medium,
    }
}

/// Shared state the sampler thread publishes and the orchestrator reads.
struct SharedState {
    level: AtomicU8,
    shutdown: AtomicBool,
    history: Mutex<VecDeque<MemorySample>>,
    recommendations: Mutex<Vec<Recommendation>>,
    last_cadence_check: Mutex<Instant>,
    gc_events: Mutex<u64>,
}

/// Runs the background sampler and exposes the current optimization level
/// and sample history to the orchestrator.
pub struct AdaptiveMemoryController {
    state: Arc<SharedState>,
    handle: Option<JoinHandle<()>>,
}

impl AdaptiveMemoryController {
    /// Starts the background sampler thread. No-op sampler if
    /// `config.enabled` is false: the thread still runs but always reports
    /// `Low` pressure at `Medium` level, which callers read the same way.
    #[must_use]
    pub fn start(config: AdaptiveMemoryConfig, reader: Arc<dyn MemoryReader>) -> Self {
        let state = Arc::new(SharedState {
            level: AtomicU8::new(level_to_byte(OptimizationLevel::Medium)),
            shutdown: AtomicBool::new(false),
            history: Mutex::new(VecDeque::with_capacity(config.history_size)),
            recommendations: Mutex::new(Vec::new()),
            last_cadence_check: Mutex::new(Instant::now()),
            gc_events: Mutex::new(0),
        });

        let thread_state = Arc::clone(&state);
        let handle = thread::spawn(move || run_sampler(&thread_state, &config, reader.as_ref()));

        Self { state, handle: Some(handle) }
    }

    /// Returns the optimization level most recently published by the
    /// sampler thread.
    #[must_use]
    pub fn current_level(&self) -> OptimizationLevel {
        byte_to_level(self.state.level.load(Ordering::Acquire))
    }

    /// Returns a snapshot of the sampler's retained history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<MemorySample> {
        self.state.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().copied().collect()
    }

    /// Returns the recommendations emitted so far.
    #[must_use]
    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.state.recommendations.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Dumps history and recommendations as a JSON memory profile, per
    /// spec §4.7's export requirement.
    #[must_use]
    pub fn export_profile(&self) -> serde_json::Value {
        let history = self.history();
        let recommendations = self.recommendations();
        serde_json::json!({
            "samples": history.iter().map(|sample| serde_json::json!({
                "sequence": sample.sequence,
                "rss_mb": sample.rss_mb,
                "available_mb": sample.available_mb,
                "pressure": pressure_str(sample.pressure),
            })).collect::<Vec<_>>(),
            "recommendations": recommendations.iter().map(recommendation_str).collect::<Vec<_>>(),
        })
    }

    /// Signals the sampler thread to stop and joins it, per spec §5's "2s
    /// join" cancellation contract.
    pub fn stop(&mut self) {
        self.state.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AdaptiveMemoryController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The sampler thread body: sample, classify, act, sleep, repeat until
/// `shutdown` is observed.
fn run_sampler(state: &Arc<SharedState>, config: &AdaptiveMemoryConfig, reader: &dyn MemoryReader) {
    let interval = Duration::from_secs_f64(config.monitoring_interval_seconds.max(0.01));
    let mut sequence = 0u64;
    let mut last_pressure = MemoryPressure::Low;
    let window_start_rss = Mutex::new(None::<f64>);

    while !state.shutdown.load(Ordering::Acquire) {
        if !config.enabled {
            thread::sleep(interval);
            continue;
        }

        let (rss_mb, available_mb) = reader.read();
        let pressure = classify(rss_mb, available_mb, config);
        let sample = MemorySample { rss_mb, available_mb, pressure, sequence };
        sequence += 1;

        {
            let mut history = state.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if history.len() >= config.history_size {
                history.pop_front();
            }
            history.push_back(sample);
        }

        if rss_mb >= config.thresholds.gc_trigger_mb && config.auto_gc_enabled {
            *state.gc_events.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
        }

        if pressure != last_pressure {
            if let Some(level) = level_for_transition(pressure, rss_mb, config) {
                state.level.store(level_to_byte(level), Ordering::Release);
            }
            last_pressure = pressure;
        }

        maybe_emit_leak_recommendation(state, config, &window_start_rss, rss_mb, pressure);
        maybe_emit_cadence_recommendation(state, config, sequence);

        thread::sleep(interval);
    }
}

/// Evaluates the leak heuristic from spec §4.7 against the current sample.
fn maybe_emit_leak_recommendation(
    state: &Arc<SharedState>,
    config: &AdaptiveMemoryConfig,
    window_start_rss: &Mutex<Option<f64>>,
    rss_mb: f64,
    pressure: MemoryPressure,
) {
    if !config.leak_detection_enabled {
        return;
    }
    let mut start = window_start_rss.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let Some(start_rss) = *start else {
        *start = Some(rss_mb);
        return;
    };
    let growth = rss_mb - start_rss;
    if growth <= config.leak_threshold_mb {
        return;
    }
    if pressure >= MemoryPressure::High {
        return;
    }
    let history = state.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let recent_leaks = {
        let recs = state.recommendations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        recs.iter().rev().take(5).any(|rec| matches!(rec, Recommendation::SuspectedLeak { .. }))
    };
    drop(history);
    if recent_leaks {
        return;
    }
    state
        .recommendations
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .push(Recommendation::SuspectedLeak { growth_mb: growth });
    *start = Some(rss_mb);
}

/// Evaluates the cadence-based recommendation engine from spec §4.7: on
/// `recommendation_window_minutes`, with at least
/// `min_samples_for_recommendation` samples, flags sustained high memory,
/// frequent GC, or a run stuck at `FALLBACK`.
fn maybe_emit_cadence_recommendation(state: &Arc<SharedState>, config: &AdaptiveMemoryConfig, sequence: u64) {
    let window = Duration::from_secs(u64::from(config.recommendation_window_minutes) * 60);
    let mut last_check = state.last_cadence_check.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if last_check.elapsed() < window {
        return;
    }
    *last_check = Instant::now();
    drop(last_check);

    if sequence < config.min_samples_for_recommendation as u64 {
        return;
    }

    let history = state.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let tail: Vec<MemorySample> = history.iter().rev().take(config.min_samples_for_recommendation).copied().collect();
    drop(history);
    if tail.is_empty() {
        return;
    }

    let mut recommendations = state.recommendations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if tail.iter().all(|sample| sample.pressure >= MemoryPressure::High) {
        recommendations.push(Recommendation::SustainedHighMemory);
    }
    let gc_events = *state.gc_events.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if gc_events > 1 {
        recommendations.push(Recommendation::FrequentGc);
    }
    if byte_to_level(state.level.load(Ordering::Acquire)) == OptimizationLevel::Fallback {
        recommendations.push(Recommendation::PermanentFallback);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    struct FixedSequenceReader {
        samples: StdMutex<VecDeque<(f64, f64)>>,
    }

    impl MemoryReader for FixedSequenceReader {
        fn read(&self) -> (f64, f64) {
            let mut samples = self.samples.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            samples.pop_front().unwrap_or((500.0, 8_000.0))
        }
    }

    #[test]
    fn classify_matches_threshold_bounds() {
        let config = AdaptiveMemoryConfig::default();
        assert_eq!(classify(100.0, 8_000.0, &config), MemoryPressure::Low);
        assert_eq!(classify(2_100.0, 8_000.0, &config), MemoryPressure::Moderate);
        assert_eq!(classify(3_100.0, 8_000.0, &config), MemoryPressure::High);
        assert_eq!(classify(3_600.0, 8_000.0, &config), MemoryPressure::Critical);
        assert_eq!(classify(100.0, 400.0, &config), MemoryPressure::Critical);
    }

    #[test]
    fn high_pressure_drops_to_low_and_recovers_to_high() {
        let config = AdaptiveMemoryConfig::default();
        assert_eq!(level_for_transition(MemoryPressure::High, 3_100.0, &config), Some(OptimizationLevel::Low));
        assert_eq!(level_for_transition(MemoryPressure::Low, 100.0, &config), Some(OptimizationLevel::High));
    }

    #[test]
    fn critical_below_fallback_trigger_only_drops_to_low() {
        let config = AdaptiveMemoryConfig::default();
        let level = level_for_transition(MemoryPressure::Critical, 3_500.0, &config);
        assert_eq!(level, Some(OptimizationLevel::Low));
        let fallback_level = level_for_transition(MemoryPressure::Critical, 3_300.0, &config);
        assert_eq!(fallback_level, Some(OptimizationLevel::Fallback));
    }

    #[test]
    fn controller_starts_samples_and_stops_within_budget() {
        let mut config = AdaptiveMemoryConfig::default();
        config.monitoring_interval_seconds = 0.01;
        config.history_size = 10;
        let reader: Arc<dyn MemoryReader> = Arc::new(FixedSequenceReader {
            samples: StdMutex::new(VecDeque::from(vec![(100.0, 8_000.0), (3_600.0, 8_000.0), (100.0, 8_000.0)])),
        });
        let mut controller = AdaptiveMemoryController::start(config, reader);
        thread::sleep(Duration::from_millis(50));
        controller.stop();
        assert!(!controller.history().is_empty());
    }
}
