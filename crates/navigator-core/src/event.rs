// navigator-core/src/event.rs
// ============================================================================
// Module: Navigator Events
// Description: Immutable event records produced by the event-generation engine.
// Purpose: Define the event schema, ordering rule, and deterministic id.
// Dependencies: serde, sha2, crate::hashing
// ============================================================================

//! ## Overview
//! Events are the only thing the event-generation engine produces; every
//! other stage reads them. An event's identity is a hash of its key
//! fields, not an auto-increment counter, so SQL mode and vector mode
//! produce identical ids for identical logical events.

use serde::Deserialize;
use serde::Serialize;

use crate::hashing::hash_bytes;
use crate::identifiers::EmployeeId;
use crate::identifiers::EventId;
use crate::identifiers::PlanDesignId;
use crate::identifiers::ScenarioId;
use crate::identifiers::SimulationYear;

/// The kind of workforce or plan event being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new employee joining the workforce.
    Hire,
    /// An employee leaving the workforce.
    Termination,
    /// A level change with an associated salary increase.
    Promotion,
    /// An annual merit salary increase.
    Merit,
    /// Initial plan enrollment.
    Enrollment,
    /// A change to an existing enrollment.
    EnrollmentChange,
    /// An automatic deferral-rate escalation.
    DeferralEscalation,
    /// An employee contribution.
    Contribution,
    /// An employer matching contribution.
    EmployerMatch,
}

impl EventType {
    /// Returns the wire-format string used in event payload tags and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hire => "hire",
            Self::Termination => "termination",
            Self::Promotion => "promotion",
            Self::Merit => "merit",
            Self::Enrollment => "enrollment",
            Self::EnrollmentChange => "enrollment_change",
            Self::DeferralEscalation => "deferral_escalation",
            Self::Contribution => "contribution",
            Self::EmployerMatch => "employer_match",
        }
    }
}

/// The method that produced an event, carried for audit and parity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    /// Produced by the SQL-mode transformation runner.
    Sql,
    /// Produced by the vectorized event factory.
    Vector,
}

/// An immutable event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Deterministic identifier, a hash of the fields listed in
    /// [`Event::compute_id`].
    pub event_id: EventId,
    /// Scenario the event belongs to.
    pub scenario_id: ScenarioId,
    /// Plan design in effect when the event was generated.
    pub plan_design_id: PlanDesignId,
    /// Employee the event applies to.
    pub employee_id: EmployeeId,
    /// Kind of event.
    pub event_type: EventType,
    /// Calendar date the event takes effect, `YYYY-MM-DD`.
    pub effective_date: String,
    /// Simulation year the event belongs to.
    pub simulation_year: SimulationYear,
    /// Event-type-specific payload, serialized as a JSON string on the wire.
    pub event_payload: serde_json::Value,
    /// The RNG draw (or `1.0` for always-eligible events) that produced it.
    pub event_probability: f64,
    /// Monotonic per-employee-per-day sequence number, used for ordering.
    pub event_sequence: u32,
    /// Mode that produced this event.
    pub generation_method: GenerationMethod,
}

impl Event {
    /// Computes the deterministic event id from scenario, plan design,
    /// employee, year, and event type, matching spec §4.10: `event_id =
    /// hash(scenario_id|plan_design_id|employee_id|year|event_type)`.
    #[must_use]
    pub fn compute_id(
        scenario_id: &ScenarioId,
        plan_design_id: &PlanDesignId,
        employee_id: &EmployeeId,
        year: SimulationYear,
        event_type: EventType,
    ) -> EventId {
        let key = format!(
            "{scenario_id}|{plan_design_id}|{employee_id}|{year}|{}",
            event_type.as_str()
        );
        EventId::from_hex(hash_bytes(key.as_bytes()).to_string())
    }

    /// The sort key used to order events within a year: `(employee_id,
    /// effective_date, event_sequence)`.
    #[must_use]
    pub fn sort_key(&self) -> (&EmployeeId, &str, u32) {
        (&self.employee_id, self.effective_date.as_str(), self.event_sequence)
    }

    /// Returns `true` if the event's effective date falls within
    /// `simulation_year`, the temporal monotonicity invariant from spec §8.
    #[must_use]
    pub fn effective_date_matches_simulation_year(&self) -> bool {
        self.effective_date
            .split('-')
            .next()
            .and_then(|year_str| year_str.parse::<i32>().ok())
            .is_some_and(|year| year == self.simulation_year.value())
    }
}

/// Sorts events in place by `(employee_id, effective_date, event_sequence)`
/// and reports the first duplicate key encountered, if any.
pub fn sort_and_check_uniqueness(events: &mut [Event]) -> Result<(), (EmployeeId, String, u32)> {
    events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    for window in events.windows(2) {
        let [a, b] = window else { continue };
        if a.sort_key() == b.sort_key() {
            return Err((b.employee_id.clone(), b.effective_date.clone(), b.event_sequence));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(employee: &str, seq: u32, date: &str) -> Event {
        Event {
            event_id: EventId::from_hex("deadbeef"),
            scenario_id: ScenarioId::new("baseline"),
            plan_design_id: PlanDesignId::new("plan-a"),
            employee_id: EmployeeId::new(employee),
            event_type: EventType::Hire,
            effective_date: date.to_string(),
            simulation_year: SimulationYear::new(2025),
            event_payload: serde_json::json!({}),
            event_probability: 1.0,
            event_sequence: seq,
            generation_method: GenerationMethod::Vector,
        }
    }

    #[test]
    fn compute_id_is_deterministic_and_mode_independent() {
        let scenario = ScenarioId::new("baseline");
        let plan = PlanDesignId::new("plan-a");
        let employee = EmployeeId::new("EMP-1");
        let year = SimulationYear::new(2025);
        let first = Event::compute_id(&scenario, &plan, &employee, year, EventType::Hire);
        let second = Event::compute_id(&scenario, &plan, &employee, year, EventType::Hire);
        assert_eq!(first, second);
        let different_type = Event::compute_id(&scenario, &plan, &employee, year, EventType::Merit);
        assert_ne!(first, different_type);
    }

    #[test]
    fn effective_date_year_mismatch_is_detected() {
        let mut event = sample_event("EMP-1", 0, "2024-06-15");
        assert!(!event.effective_date_matches_simulation_year());
        event.effective_date = "2025-06-15".to_string();
        assert!(event.effective_date_matches_simulation_year());
    }

    #[test]
    fn sort_and_check_uniqueness_detects_duplicate_keys() {
        let mut events = vec![
            sample_event("EMP-2", 0, "2025-01-01"),
            sample_event("EMP-1", 0, "2025-06-15"),
        ];
        assert!(sort_and_check_uniqueness(&mut events).is_ok());
        assert_eq!(events[0].employee_id, EmployeeId::new("EMP-1"));

        let mut duplicated = vec![sample_event("EMP-1", 0, "2025-06-15"), sample_event("EMP-1", 0, "2025-06-15")];
        assert!(sort_and_check_uniqueness(&mut duplicated).is_err());
    }
}
