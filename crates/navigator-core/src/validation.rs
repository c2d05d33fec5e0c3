// navigator-core/src/validation.rs
// ============================================================================
// Module: Validation Engine Primitives
// Description: Rule objects and severity-ranked outcomes for post-year checks.
// Purpose: Provide the `ValidationRule` trait and the four standard rules
//          from spec §4.6, pure functions over already-materialized data.
// Dependencies: serde, sim-logic
// ============================================================================

//! ## Overview
//! Each rule is a pure evaluation over already-computed inputs (counts,
//! histograms, event sequences); none of them touch the store directly.
//! The scheduler gathers inputs and calls rules; `sim-logic`'s tri-state
//! folding combines their outcomes into a single year-level decision,
//! mirroring how the teacher's comparator folds predicate results into a
//! gate outcome.

use std::collections::BTreeMap;

use serde::Serialize;
use sim_logic::LogicMode;
use sim_logic::TriLogic;
use sim_logic::TriState;

use crate::identifiers::EmployeeId;

/// Severity of a validation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Worth surfacing but not blocking.
    Warning,
    /// A real problem; blocks the year if `fail_on_validation_error` is set.
    Error,
    /// A severe problem; always blocks the year if fail-fast is set.
    Critical,
}

/// The outcome of evaluating a single validation rule.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    /// Rule name, for reporting.
    pub rule: &'static str,
    /// Whether the rule's check passed.
    pub passed: bool,
    /// Severity to apply if `passed` is `false`.
    pub severity: Severity,
    /// Human-readable summary.
    pub message: String,
    /// Structured details supporting the message.
    pub details: serde_json::Value,
}

impl ValidationOutcome {
    /// Converts the outcome to a tri-state for folding: `passed` maps to
    /// `True`, a failing `Info`/`Warning` maps to `Unknown` (noted but not
    /// blocking), and a failing `Error`/`Critical` maps to `False`.
    #[must_use]
    pub fn as_tristate(&self) -> TriState {
        if self.passed {
            TriState::True
        } else if self.severity >= Severity::Error {
            TriState::False
        } else {
            TriState::Unknown
        }
    }
}

/// A post-year validation rule.
pub trait ValidationRule {
    /// Evaluates the rule, returning its outcome.
    fn evaluate(&self) -> ValidationOutcome;
}

/// Folds a set of rule outcomes into a single year-level pass/fail
/// decision under Kleene tri-state logic: the year passes only if no
/// outcome folds to `False`.
#[must_use]
pub fn year_passes(outcomes: &[ValidationOutcome]) -> bool {
    let mut state = TriState::True;
    for outcome in outcomes {
        state = LogicMode::Kleene.and(state, outcome.as_tristate());
    }
    state != TriState::False
}

/// Flags a relative row-count drift between this year and the prior year
/// that exceeds `max_relative_drift`.
pub struct RowCountDriftRule {
    /// Table under inspection, for the outcome message.
    pub table: &'static str,
    /// Prior year's row count.
    pub prior_count: u64,
    /// Current year's row count.
    pub current_count: u64,
    /// Maximum tolerated relative drift, e.g. `0.5` for 50%.
    pub max_relative_drift: f64,
}

impl ValidationRule for RowCountDriftRule {
    fn evaluate(&self) -> ValidationOutcome {
        let drift = if self.prior_count == 0 {
            if self.current_count == 0 { 0.0 } else { f64::INFINITY }
        } else {
            (self.current_count as f64 - self.prior_count as f64).abs() / self.prior_count as f64
        };
        let passed = drift <= self.max_relative_drift;
        ValidationOutcome {
            rule: "row_count_drift",
            passed,
            severity: Severity::Warning,
            message: format!(
                "{} row count drifted {:.1}% ({} -> {})",
                self.table,
                drift * 100.0,
                self.prior_count,
                self.current_count
            ),
            details: serde_json::json!({
                "table": self.table,
                "prior_count": self.prior_count,
                "current_count": self.current_count,
                "relative_drift": drift,
            }),
        }
    }
}

/// Flags a hire:termination ratio outside the expected bounds.
pub struct HireTerminationRatioRule {
    /// Number of hire events this year.
    pub hires: u64,
    /// Number of termination events this year.
    pub terminations: u64,
    /// Minimum acceptable ratio of hires to terminations.
    pub min_ratio: f64,
    /// Maximum acceptable ratio of hires to terminations.
    pub max_ratio: f64,
}

impl ValidationRule for HireTerminationRatioRule {
    fn evaluate(&self) -> ValidationOutcome {
        let ratio = if self.terminations == 0 {
            if self.hires == 0 { 1.0 } else { f64::INFINITY }
        } else {
            self.hires as f64 / self.terminations as f64
        };
        let passed = (self.min_ratio..=self.max_ratio).contains(&ratio);
        ValidationOutcome {
            rule: "hire_termination_ratio",
            passed,
            severity: Severity::Error,
            message: format!(
                "hire:termination ratio {ratio:.2} outside [{}, {}]",
                self.min_ratio, self.max_ratio
            ),
            details: serde_json::json!({
                "hires": self.hires,
                "terminations": self.terminations,
                "ratio": ratio,
            }),
        }
    }
}

/// One employee's `(effective_date, event_sequence)` pair for sequence
/// checking.
#[derive(Debug, Clone)]
pub struct SequencePoint {
    /// Employee the point belongs to.
    pub employee_id: EmployeeId,
    /// Event's effective date, `YYYY-MM-DD`.
    pub effective_date: String,
    /// Event's sequence number.
    pub event_sequence: u32,
}

/// Flags any employee whose `(effective_date, event_sequence)` pairs are
/// not strictly increasing.
pub struct EventSequenceRule {
    /// Points to check, assumed grouped by employee in event-emission order.
    pub points: Vec<SequencePoint>,
}

impl ValidationRule for EventSequenceRule {
    fn evaluate(&self) -> ValidationOutcome {
        let mut last_by_employee: BTreeMap<&str, (&str, u32)> = BTreeMap::new();
        let mut violations = Vec::new();
        for point in &self.points {
            let key = point.employee_id.as_str();
            if let Some(&(last_date, last_seq)) = last_by_employee.get(key) {
                let current = (point.effective_date.as_str(), point.event_sequence);
                if current <= (last_date, last_seq) {
                    violations.push(key.to_string());
                }
            }
            last_by_employee.insert(key, (point.effective_date.as_str(), point.event_sequence));
        }
        let passed = violations.is_empty();
        ValidationOutcome {
            rule: "event_sequence",
            passed,
            severity: Severity::Critical,
            message: if passed {
                "all event sequences are monotonic".to_string()
            } else {
                format!("{} employees have non-monotonic event sequences", violations.len())
            },
            details: serde_json::json!({ "violating_employees": violations }),
        }
    }
}

/// Flags an event-type count that is an outlier relative to its
/// historical mean by more than `z_threshold` standard deviations.
pub struct EventSpikeRule {
    /// Event type under inspection, for the outcome message.
    pub event_type: &'static str,
    /// This year's count for the event type.
    pub current_count: u64,
    /// Historical mean count for the event type.
    pub historical_mean: f64,
    /// Historical standard deviation count for the event type.
    pub historical_stddev: f64,
    /// Number of standard deviations beyond which a count is a spike.
    pub z_threshold: f64,
}

impl ValidationRule for EventSpikeRule {
    fn evaluate(&self) -> ValidationOutcome {
        let z = if self.historical_stddev > 0.0 {
            (self.current_count as f64 - self.historical_mean) / self.historical_stddev
        } else {
            0.0
        };
        let passed = z.abs() <= self.z_threshold;
        ValidationOutcome {
            rule: "event_spike",
            passed,
            severity: Severity::Warning,
            message: format!("{} count z-score {z:.2} (threshold {})", self.event_type, self.z_threshold),
            details: serde_json::json!({
                "event_type": self.event_type,
                "current_count": self.current_count,
                "historical_mean": self.historical_mean,
                "historical_stddev": self.historical_stddev,
                "z_score": z,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_count_drift_within_bound_passes() {
        let rule = RowCountDriftRule {
            table: "fct_workforce_snapshot",
            prior_count: 1_000,
            current_count: 1_040,
            max_relative_drift: 0.1,
        };
        assert!(rule.evaluate().passed);
    }

    #[test]
    fn row_count_drift_beyond_bound_fails() {
        let rule = RowCountDriftRule {
            table: "fct_workforce_snapshot",
            prior_count: 1_000,
            current_count: 1_500,
            max_relative_drift: 0.1,
        };
        assert!(!rule.evaluate().passed);
    }

    #[test]
    fn hire_termination_ratio_flags_error_severity() {
        let rule = HireTerminationRatioRule {
            hires: 5,
            terminations: 100,
            min_ratio: 0.5,
            max_ratio: 2.0,
        };
        let outcome = rule.evaluate();
        assert!(!outcome.passed);
        assert_eq!(outcome.severity, Severity::Error);
    }

    #[test]
    fn event_sequence_detects_non_monotonic_pairs() {
        let rule = EventSequenceRule {
            points: vec![
                SequencePoint {
                    employee_id: EmployeeId::new("EMP-1"),
                    effective_date: "2025-06-15".to_string(),
                    event_sequence: 1,
                },
                SequencePoint {
                    employee_id: EmployeeId::new("EMP-1"),
                    effective_date: "2025-06-15".to_string(),
                    event_sequence: 1,
                },
            ],
        };
        assert!(!rule.evaluate().passed);
    }

    #[test]
    fn year_passes_blocks_only_on_error_or_critical() {
        let warning_only = vec![RowCountDriftRule {
            table: "t",
            prior_count: 100,
            current_count: 200,
            max_relative_drift: 0.1,
        }
        .evaluate()];
        assert!(year_passes(&warning_only));

        let with_error = vec![HireTerminationRatioRule {
            hires: 1,
            terminations: 1_000,
            min_ratio: 0.5,
            max_ratio: 2.0,
        }
        .evaluate()];
        assert!(!year_passes(&with_error));
    }
}
