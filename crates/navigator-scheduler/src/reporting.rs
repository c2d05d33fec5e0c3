// navigator-scheduler/src/reporting.rs
// ============================================================================
// Module: Reporting
// Description: The reporting interface the orchestrator calls into.
// Purpose: Decouple the orchestrator from any concrete analytics
//          implementation; reporting content itself is out of scope.
// Dependencies: navigator-core, serde_json
// ============================================================================

//! ## Overview
//! Reporting is an interface-only concern here: the orchestrator needs
//! somewhere to hand year and multi-year summaries, but what a report
//! renders into (CSV, a dashboard, a data warehouse) is deliberately left
//! to an implementation the core doesn't depend on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use navigator_core::SimulationYear;
use serde_json::Value;

use crate::stage::YearRunOutcome;

// ============================================================================
// SECTION: Reporter
// ============================================================================

/// Receives year and multi-year summaries. The orchestrator calls this
/// once per year and once at the end of a multi-year run; it never reads
/// a report back.
pub trait Reporter {
    /// Reports the outcome of one completed year.
    fn year_summary(&mut self, outcome: &YearRunOutcome);

    /// Reports the outcome of a completed multi-year run, spanning
    /// `first_year..=last_year`, as an arbitrary JSON payload (growth
    /// analysis, event trends, participation trends, threading metadata).
    fn multi_year_summary(&mut self, first_year: SimulationYear, last_year: SimulationYear, payload: Value);
}

/// Discards every report; the default when no reporting sink is wired up.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn year_summary(&mut self, _outcome: &YearRunOutcome) {}

    fn multi_year_summary(&mut self, _first_year: SimulationYear, _last_year: SimulationYear, _payload: Value) {}
}

/// Accumulates reports as JSON values, for a caller to write to
/// `reports/year_<Y>.json` and `reports/multi_year_summary_<start>_<end>.csv`
/// (or, in this in-process form, to hand to a test or CLI for printing).
#[derive(Debug, Default)]
pub struct JsonReporter {
    /// One entry per year reported so far.
    pub year_reports: Vec<Value>,
    /// The most recent multi-year summary reported, if any.
    pub multi_year_report: Option<Value>,
}

impl Reporter for JsonReporter {
    fn year_summary(&mut self, outcome: &YearRunOutcome) {
        let stages: Vec<&'static str> = outcome.stages_completed.iter().map(|stage| stage.as_str()).collect();
        self.year_reports.push(serde_json::json!({
            "year": outcome.year.value(),
            "stages_completed": stages,
            "self_healed": outcome.self_healed,
            "advisory_count": outcome.advisories.len(),
        }));
    }

    fn multi_year_summary(&mut self, first_year: SimulationYear, last_year: SimulationYear, payload: Value) {
        self.multi_year_report = Some(serde_json::json!({
            "start_year": first_year.value(),
            "end_year": last_year.value(),
            "payload": payload,
        }));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test assertions unwrap option access directly.")]

    use super::*;
    use crate::stage::StageName;

    fn outcome() -> YearRunOutcome {
        YearRunOutcome {
            year: SimulationYear::new(2025),
            stages_completed: vec![StageName::Initialization, StageName::Foundation],
            advisories: vec![],
            self_healed: false,
        }
    }

    #[test]
    fn null_reporter_accepts_every_call_without_storing_anything() {
        let mut reporter = NullReporter;
        reporter.year_summary(&outcome());
        reporter.multi_year_summary(SimulationYear::new(2025), SimulationYear::new(2027), serde_json::json!({}));
    }

    #[test]
    fn json_reporter_accumulates_year_reports() {
        let mut reporter = JsonReporter::default();
        reporter.year_summary(&outcome());
        assert_eq!(reporter.year_reports.len(), 1);
        assert_eq!(reporter.year_reports[0]["year"], 2025);
    }

    #[test]
    fn json_reporter_keeps_only_the_latest_multi_year_summary() {
        let mut reporter = JsonReporter::default();
        reporter.multi_year_summary(SimulationYear::new(2025), SimulationYear::new(2026), serde_json::json!({"a": 1}));
        reporter.multi_year_summary(SimulationYear::new(2025), SimulationYear::new(2027), serde_json::json!({"a": 2}));
        assert_eq!(reporter.multi_year_report.as_ref().unwrap()["end_year"], 2027);
    }
}
