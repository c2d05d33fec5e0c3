// navigator-core/src/registry.rs
// ============================================================================
// Module: Registry Entries
// Description: Monotonic per-employee accumulator state.
// Purpose: Carry the fields registries fold events into across year
//          transitions. Persistence lives in `navigator-store-sqlite`.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A registry entry only ever grows more specific: `first_enrollment_date`
//! is set once and never cleared; `escalation_count` only increments.
//! Entries are updated after a year's events are durable, never before.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::EmployeeId;

/// Monotonic enrollment state for a single employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRegistryEntry {
    /// Employee the entry belongs to.
    pub employee_id: EmployeeId,
    /// Date of the employee's first enrollment event, `YYYY-MM-DD`, set once.
    pub first_enrollment_date: Option<String>,
    /// Whether the employee has ever opted out after enrolling.
    pub ever_opted_out: bool,
    /// Current deferral rate, in `[0, 1]`.
    pub current_deferral_rate: f64,
}

impl EnrollmentRegistryEntry {
    /// Creates a fresh entry with no enrollment history.
    #[must_use]
    pub const fn new(employee_id: EmployeeId) -> Self {
        Self {
            employee_id,
            first_enrollment_date: None,
            ever_opted_out: false,
            current_deferral_rate: 0.0,
        }
    }

    /// Folds an enrollment event into the entry. Idempotent: a repeated
    /// enrollment on the same date does not move `first_enrollment_date`.
    pub fn apply_enrollment(&mut self, effective_date: &str, deferral_rate: f64) {
        if self.first_enrollment_date.is_none() {
            self.first_enrollment_date = Some(effective_date.to_string());
        }
        self.current_deferral_rate = deferral_rate;
    }

    /// Folds an opt-out into the entry.
    pub fn apply_opt_out(&mut self) {
        self.ever_opted_out = true;
        self.current_deferral_rate = 0.0;
    }
}

/// Monotonic deferral-escalation state for a single employee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeferralEscalationRegistryEntry {
    /// Number of escalations applied so far; never decreases.
    pub escalation_count: u32,
    /// Deferral rate after the most recent escalation.
    pub current_deferral_rate: f64,
}

impl DeferralEscalationRegistryEntry {
    /// Creates a fresh entry at the given starting deferral rate.
    #[must_use]
    pub const fn new(starting_deferral_rate: f64) -> Self {
        Self {
            escalation_count: 0,
            current_deferral_rate: starting_deferral_rate,
        }
    }

    /// Folds a deferral-escalation event into the entry.
    pub fn apply_escalation(&mut self, new_rate: f64) {
        self.escalation_count += 1;
        self.current_deferral_rate = new_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_enrollment_date_is_set_once() {
        let mut entry = EnrollmentRegistryEntry::new(EmployeeId::new("EMP-1"));
        entry.apply_enrollment("2025-04-01", 0.03);
        entry.apply_enrollment("2026-04-01", 0.05);
        assert_eq!(entry.first_enrollment_date.as_deref(), Some("2025-04-01"));
        assert_eq!(entry.current_deferral_rate, 0.05);
    }

    #[test]
    fn escalation_count_is_monotonic() {
        let mut entry = DeferralEscalationRegistryEntry::new(0.03);
        entry.apply_escalation(0.04);
        entry.apply_escalation(0.05);
        assert_eq!(entry.escalation_count, 2);
        assert_eq!(entry.current_deferral_rate, 0.05);
    }
}
