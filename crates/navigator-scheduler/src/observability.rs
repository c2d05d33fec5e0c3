// navigator-scheduler/src/observability.rs
// ============================================================================
// Module: Observability
// Description: Structured logging, a scoped performance monitor, and the
//              run-summary generator.
// Purpose: Give every run a newline-delimited JSON log plus a redacted,
//          bounded-size summary safe to persist and serialize.
// Dependencies: navigator-core, serde_json
// ============================================================================

//! ## Overview
//! Three pieces: [`JsonLogger`] writes one structured record per line;
//! [`PerformanceMonitor`] is a scoped resource whose `Drop` finalizes
//! timing and status on every exit path, success or failure; [`RunSummary`]
//! accumulates errors, warnings, and metrics for a run and renders the
//! four artifact files from spec §4.12/§6.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

use navigator_core::RunId;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Structured Logger
// ============================================================================

/// Severity of a structured log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Routine progress.
    Info,
    /// A recoverable anomaly.
    Warn,
    /// An unrecoverable failure.
    Error,
}

/// One newline-delimited-JSON log record: `run_id`, `timestamp`, `level`,
/// `message`, plus arbitrary structured fields, per spec §4.12.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Run the record belongs to.
    pub run_id: RunId,
    /// Unix-millis timestamp the record was produced.
    pub timestamp: i64,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Structured fields attached to the record.
    pub fields: BTreeMap<String, Value>,
}

/// Builds structured log records for one run, serializing each as a JSON
/// line a caller writes to `logs/navigator.log`.
pub struct JsonLogger {
    run_id: RunId,
    clock: fn() -> i64,
}

impl JsonLogger {
    /// Builds a logger for `run_id`, using `clock` to stamp each record.
    /// Callers inject the clock (rather than reading wall time directly)
    /// so log output stays testable.
    #[must_use]
    pub const fn new(run_id: RunId, clock: fn() -> i64) -> Self {
        Self { run_id, clock }
    }

    /// Builds one log record with the given level, message, and fields.
    #[must_use]
    pub fn record(&self, level: LogLevel, message: impl Into<String>, fields: BTreeMap<String, Value>) -> LogRecord {
        LogRecord { run_id: self.run_id.clone(), timestamp: (self.clock)(), level, message: message.into(), fields }
    }

    /// Serializes a record as a single JSON line, without a trailing
    /// newline.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized, which should
    /// not happen for this type.
    pub fn to_line(record: &LogRecord) -> Result<String, serde_json::Error> {
        serde_json::to_string(record)
    }
}

// ============================================================================
// SECTION: Performance Monitor
// ============================================================================

/// Final status of a monitored operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still in progress; the status a monitor reports if dropped without
    /// an explicit `finish`.
    Running,
    /// Completed without error.
    Success,
    /// Completed with an error.
    Failed,
}

/// Wall-clock and memory metrics captured for one monitored operation.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    /// Operation name.
    pub operation: String,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Peak resident set size observed during the operation, in bytes.
    pub peak_rss_bytes: u64,
    /// Final status.
    pub status: RunStatus,
}

/// A scoped resource that times an operation and reports its status on
/// every exit path. Reading memory belongs to the caller (usually the
/// adaptive memory controller's last sample); this type only threads the
/// peak value through to the final report.
pub struct PerformanceMonitor {
    operation: String,
    start: Instant,
    peak_rss_bytes: u64,
    status: RunStatus,
    reports: Vec<PerformanceReport>,
}

impl PerformanceMonitor {
    /// Starts timing `operation`.
    #[must_use]
    pub fn start(operation: impl Into<String>) -> Self {
        Self { operation: operation.into(), start: Instant::now(), peak_rss_bytes: 0, status: RunStatus::Running, reports: Vec::new() }
    }

    /// Records a peak RSS observation, keeping the maximum seen so far.
    pub fn observe_rss(&mut self, rss_bytes: u64) {
        self.peak_rss_bytes = self.peak_rss_bytes.max(rss_bytes);
    }

    /// Marks the operation successful and finalizes its report.
    pub fn finish_success(&mut self) {
        self.finish(RunStatus::Success);
    }

    /// Marks the operation failed and finalizes its report.
    pub fn finish_failed(&mut self) {
        self.finish(RunStatus::Failed);
    }

    fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.reports.push(PerformanceReport {
            operation: self.operation.clone(),
            duration: self.start.elapsed(),
            peak_rss_bytes: self.peak_rss_bytes,
            status,
        });
    }

    /// Returns every report finalized so far.
    #[must_use]
    pub fn reports(&self) -> &[PerformanceReport] {
        &self.reports
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        if matches!(self.status, RunStatus::Running) {
            self.finish(RunStatus::Failed);
        }
    }
}

// ============================================================================
// SECTION: Run Summary
// ============================================================================

/// A timestamped error or warning entry with free-form context.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    /// Unix-millis timestamp the entry was recorded.
    pub timestamp: i64,
    /// Human-readable message.
    pub message: String,
    /// Structured context (stage, year, table, etc).
    pub context: BTreeMap<String, Value>,
}

/// A redacted, bounded-size run summary: only status, counts, and safe
/// context, never raw event payloads or employee data.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run this summary covers.
    pub run_id: RunId,
    /// Final status of the run.
    pub status: RunStatus,
    /// Errors recorded during the run.
    pub errors: Vec<SummaryEntry>,
    /// Warnings recorded during the run.
    pub warnings: Vec<SummaryEntry>,
    /// Custom numeric metrics, e.g. `years_completed`, `events_generated`.
    pub metrics: BTreeMap<String, f64>,
    /// A snapshot of the environment the run executed in.
    pub environment: BTreeMap<String, String>,
    /// The config hash in effect for the run.
    pub config_hash: String,
    /// Path to the most recent backup/checkpoint, if one exists.
    pub backup_path: Option<String>,
}

impl RunSummary {
    /// Creates an empty, still-running summary for `run_id`.
    #[must_use]
    pub fn new(run_id: RunId, config_hash: String) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            errors: Vec::new(),
            warnings: Vec::new(),
            metrics: BTreeMap::new(),
            environment: BTreeMap::new(),
            config_hash,
            backup_path: None,
        }
    }

    /// Records an error entry.
    pub fn record_error(&mut self, timestamp: i64, message: impl Into<String>, context: BTreeMap<String, Value>) {
        self.errors.push(SummaryEntry { timestamp, message: message.into(), context });
    }

    /// Records a warning entry.
    pub fn record_warning(&mut self, timestamp: i64, message: impl Into<String>, context: BTreeMap<String, Value>) {
        self.warnings.push(SummaryEntry { timestamp, message: message.into(), context });
    }

    /// Sets a numeric metric.
    pub fn set_metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.insert(name.into(), value);
    }

    /// Finalizes the summary as successful if no errors were recorded,
    /// failed otherwise.
    pub fn finalize(&mut self) {
        self.status = if self.errors.is_empty() { RunStatus::Success } else { RunStatus::Failed };
    }

    /// Renders `summary.json`: status, metrics, environment, config hash,
    /// and backup path, without the error/warning detail (those get their
    /// own files).
    #[must_use]
    pub fn summary_json(&self) -> Value {
        json!({
            "run_id": self.run_id.as_str(),
            "status": self.status,
            "metrics": self.metrics,
            "environment": self.environment,
            "config_hash": self.config_hash,
            "backup_path": self.backup_path,
        })
    }

    /// Renders `errors.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entries cannot be serialized.
    pub fn errors_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.errors)
    }

    /// Renders `warnings.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entries cannot be serialized.
    pub fn warnings_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.warnings)
    }

    /// Renders `performance.json` from a monitor's finalized reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the reports cannot be serialized.
    pub fn performance_json(monitor: &PerformanceMonitor) -> Result<Value, serde_json::Error> {
        serde_json::to_value(monitor.reports())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
