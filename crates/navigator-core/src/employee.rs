// navigator-core/src/employee.rs
// ============================================================================
// Module: Employee & Workforce Snapshot
// Description: Per-year materialized employee state.
// Purpose: Carry the fields that evolve year over year and enforce the
//          snapshot invariants from the data model.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `Employee` is the logical entity; `WorkforceSnapshot` is what gets
//! materialized to the analytical store at the end of a year. Both are
//! plain data — the rules that govern *how* they change year to year live
//! in the scheduler's transition logic, not here.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::EmployeeId;
use crate::identifiers::SimulationYear;

/// Employment status of an employee at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    /// Actively employed.
    Active,
    /// Terminated; may not return to `Active` without a new hire event.
    Terminated,
}

/// Per-year materialization of an employee's compensation and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkforceSnapshot {
    /// Employee the snapshot belongs to.
    pub employee_id: EmployeeId,
    /// Simulation year the snapshot covers.
    pub simulation_year: SimulationYear,
    /// Compensation in effect at the end of the year.
    pub current_compensation: f64,
    /// Compensation prorated for partial-year employment.
    pub prorated_annual_compensation: f64,
    /// Full-year-equivalent compensation, independent of partial employment.
    pub full_year_equivalent_compensation: f64,
    /// Employment status at year end.
    pub employment_status: EmploymentStatus,
    /// Job level.
    pub level: u8,
    /// Age in whole years.
    pub age: u32,
    /// Tenure in whole years.
    pub tenure: u32,
}

/// A snapshot invariant violation.
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    /// `prorated_annual_compensation` exceeded `full_year_equivalent_compensation`.
    #[error(
        "employee {employee_id} year {year}: prorated compensation {prorated} exceeds full-year equivalent {full_year}"
    )]
    ProratedExceedsFullYear {
        /// Employee the violation was found on.
        employee_id: EmployeeId,
        /// Simulation year the violation was found in.
        year: SimulationYear,
        /// The offending prorated value.
        prorated: f64,
        /// The full-year-equivalent value it exceeded.
        full_year: f64,
    },
}

impl WorkforceSnapshot {
    /// Validates the snapshot against the invariants in the data model:
    /// prorated compensation never exceeds the full-year equivalent.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ProratedExceedsFullYear`] on violation.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.prorated_annual_compensation > self.full_year_equivalent_compensation {
            return Err(SnapshotError::ProratedExceedsFullYear {
                employee_id: self.employee_id.clone(),
                year: self.simulation_year,
                prorated: self.prorated_annual_compensation,
                full_year: self.full_year_equivalent_compensation,
            });
        }
        Ok(())
    }
}

/// Checks the year-over-year lifecycle rule: a terminated employee may
/// never reappear as active without an intervening hire event in the
/// newer snapshot's year.
#[must_use]
pub fn is_forbidden_resurrection(
    prior: Option<&WorkforceSnapshot>,
    current: &WorkforceSnapshot,
    has_hire_event_in_current_year: bool,
) -> bool {
    match prior {
        Some(prior) if prior.employment_status == EmploymentStatus::Terminated => {
            current.employment_status == EmploymentStatus::Active && !has_hire_event_in_current_year
        }
        _ => false,
    }
}

/// Checks the year-over-year compensation bound: unless an explicit
/// promotion accompanies the change, salary may move by at most
/// `[-5%, +20%]`.
#[must_use]
pub fn is_compensation_change_within_bounds(
    prior_compensation: f64,
    current_compensation: f64,
    had_promotion_event: bool,
) -> bool {
    if had_promotion_event || prior_compensation <= 0.0 {
        return true;
    }
    let ratio = current_compensation / prior_compensation;
    (0.95..=1.20).contains(&ratio)
}
