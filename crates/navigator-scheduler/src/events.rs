// navigator-scheduler/src/events.rs
// ============================================================================
// Module: Event-Generation Engine
// Description: Vector-mode event factory plus a SQL/vector hybrid dispatcher.
// Purpose: Produce a year's hire/termination/promotion/merit/enrollment
//          events deterministically, regardless of which mode runs them.
// Dependencies: navigator-core, navigator-providers
// ============================================================================

//! ## Overview
//! `EVENT_GENERATION` has two interchangeable implementations. SQL mode
//! delegates to the transformation runner, sharded or single-shot. Vector
//! mode computes events in-process from an enriched baseline using the
//! deterministic RNG and a parameter table, in the fixed order `hire,
//! termination, promotion, merit, enrollment` from spec §4.10. The
//! dispatcher picks one based on configuration and can fall back from
//! vector to SQL on failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use navigator_core::EmployeeId;
use navigator_core::Event;
use navigator_core::EventGenerationMode;
use navigator_core::EventId;
use navigator_core::EventType;
use navigator_core::GenerationMethod;
use navigator_core::PlanDesignId;
use navigator_core::ScenarioId;
use navigator_core::SimulationYear;
use navigator_core::Stream;
use navigator_core::draw;
use navigator_core::sort_and_check_uniqueness;
use navigator_providers::ParameterTable;
use navigator_providers::RunnerError;
use navigator_providers::TransformationRunner;
use thiserror::Error;

// ============================================================================
// SECTION: Baseline & Enrichment
// ============================================================================

/// An employee as loaded from the prior year's snapshot, before the
/// per-year derived fields vector mode needs are computed.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineEmployee {
    /// Employee identifier.
    pub employee_id: EmployeeId,
    /// Calendar year the employee was hired.
    pub hire_year: i32,
    /// Compensation in effect at the start of the year.
    pub compensation: f64,
    /// Whether the employee is already enrolled in the plan.
    pub is_enrolled: bool,
    /// Whether the employee is active (terminated employees generate no
    /// further events unless rehired).
    pub active: bool,
}

/// A deterministic, low/average/high performance tier derived from the
/// employee id rather than stored state, per spec §4.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceTier {
    /// Bottom tier; raises termination hazard.
    Low,
    /// Middle tier.
    Average,
    /// Top tier.
    High,
}

impl PerformanceTier {
    /// Returns the wire-format string used in event payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Average => "average",
            Self::High => "high",
        }
    }
}

/// Derives a performance tier from the last character of `employee_id`,
/// so it never needs its own stored column.
#[must_use]
pub fn performance_tier(employee_id: &EmployeeId) -> PerformanceTier {
    match employee_id.as_str().bytes().next_back().map(|b| b % 3) {
        Some(0) => PerformanceTier::Low,
        Some(1) => PerformanceTier::Average,
        _ => PerformanceTier::High,
    }
}

/// Buckets compensation into a job level in `[1, 5]`.
#[must_use]
pub fn level_from_compensation(compensation: f64) -> u8 {
    match compensation {
        c if c < 60_000.0 => 1,
        c if c < 90_000.0 => 2,
        c if c < 130_000.0 => 3,
        c if c < 180_000.0 => 4,
        _ => 5,
    }
}

/// The per-year derived fields vector mode joins onto a baseline employee.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedEmployee {
    /// The underlying baseline row.
    pub baseline: BaselineEmployee,
    /// Whole years of tenure as of `year`.
    pub tenure_years: u32,
    /// Whole months of tenure as of `year`.
    pub tenure_months: u32,
    /// Compensation-bucketed job level.
    pub level_id: u8,
    /// Deterministic performance tier.
    pub performance_tier: PerformanceTier,
}

/// Enriches a baseline employee with the fields vector mode's event rules
/// depend on.
#[must_use]
pub fn enrich(baseline: BaselineEmployee, year: SimulationYear) -> EnrichedEmployee {
    let tenure_years = u32::try_from(year.value() - baseline.hire_year).unwrap_or(0);
    let tenure_months = tenure_years.saturating_mul(12);
    let level_id = level_from_compensation(baseline.compensation);
    let performance_tier = performance_tier(&baseline.employee_id);
    EnrichedEmployee { baseline, tenure_years, tenure_months, level_id, performance_tier }
}

// ============================================================================
// SECTION: Errors & Summary
// ============================================================================

/// An event-generation failure.
#[derive(Debug, Error)]
pub enum EventsError {
    /// Two generated events collided on `(employee_id, effective_date,
    /// event_sequence)`.
    #[error("duplicate event key for employee {0} on {1} (sequence {2})")]
    DuplicateKey(EmployeeId, String, u32),
    /// The SQL-mode transformation runner failed.
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Per-year event counts, mirroring `generation_summary.json` from spec
/// §4.10.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventGenerationSummary {
    /// Year the summary covers.
    pub hires: usize,
    /// Termination events produced.
    pub terminations: usize,
    /// Promotion events produced.
    pub promotions: usize,
    /// Merit events produced.
    pub merits: usize,
    /// Enrollment events produced.
    pub enrollments: usize,
    /// Whether vector mode failed and the dispatcher fell back to SQL mode.
    pub fallback_used: bool,
}

impl EventGenerationSummary {
    /// Total events across every type.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.hires + self.terminations + self.promotions + self.merits + self.enrollments
    }
}

// ============================================================================
// SECTION: Vector-Mode Factory
// ============================================================================

/// Computes all events for one year from an enriched baseline, using the
/// deterministic RNG and a parameter table.
pub struct VectorEventFactory<'a> {
    scenario_id: ScenarioId,
    plan_design_id: PlanDesignId,
    seed: u64,
    parameters: &'a ParameterTable,
}

impl<'a> VectorEventFactory<'a> {
    /// Builds a factory bound to one scenario, plan design, and seed.
    #[must_use]
    pub const fn new(scenario_id: ScenarioId, plan_design_id: PlanDesignId, seed: u64, parameters: &'a ParameterTable) -> Self {
        Self { scenario_id, plan_design_id, seed, parameters }
    }

    fn event_id(&self, employee_id: &EmployeeId, year: SimulationYear, event_type: EventType) -> EventId {
        Event::compute_id(&self.scenario_id, &self.plan_design_id, employee_id, year, event_type)
    }

    /// Generates `target_hires` synthetic hire events for `year`, per
    /// spec's resolved Open Question: the exact count, never an
    /// approximation of it.
    fn generate_hires(&self, year: SimulationYear, target_hires: u32) -> Vec<Event> {
        let mut events = Vec::with_capacity(target_hires as usize);
        for index in 0..target_hires {
            let employee_id = EmployeeId::new(format!("HIRE-{}-{index:05}", year.value()));
            let level = 1u8;
            let starting_salary = self.parameters.get_parameter("hire", "starting_salary", level, 55_000.0);
            let payload = serde_json::json!({
                "level": level,
                "starting_salary": starting_salary,
                "hire_date": format!("{}-07-01", year.value()),
            });
            events.push(Event {
                event_id: self.event_id(&employee_id, year, EventType::Hire),
                scenario_id: self.scenario_id.clone(),
                plan_design_id: self.plan_design_id.clone(),
                employee_id,
                event_type: EventType::Hire,
                effective_date: format!("{}-07-01", year.value()),
                simulation_year: year,
                event_payload: payload,
                event_probability: 1.0,
                event_sequence: 0,
                generation_method: GenerationMethod::Vector,
            });
        }
        events
    }

    fn generate_termination(&self, employee: &EnrichedEmployee, year: SimulationYear) -> Option<Event> {
        if !employee.baseline.active {
            return None;
        }
        let base_rate = self.parameters.get_parameter("termination", "base_rate", employee.level_id, 0.10);
        let multiplier = if employee.tenure_months < 12 {
            1.25
        } else if matches!(employee.performance_tier, PerformanceTier::Low) {
            2.0
        } else {
            1.0
        };
        let rate = base_rate * multiplier;
        let value = draw(self.seed, &employee.baseline.employee_id, year, Stream::Termination, None);
        if value >= rate {
            return None;
        }
        let payload = serde_json::json!({
            "reason": "attrition",
            "level": employee.level_id,
            "tenure_months": employee.tenure_months,
            "performance_tier": employee.performance_tier.as_str(),
        });
        Some(Event {
            event_id: self.event_id(&employee.baseline.employee_id, year, EventType::Termination),
            scenario_id: self.scenario_id.clone(),
            plan_design_id: self.plan_design_id.clone(),
            employee_id: employee.baseline.employee_id.clone(),
            event_type: EventType::Termination,
            effective_date: format!("{}-09-15", year.value()),
            simulation_year: year,
            event_payload: payload,
            event_probability: value,
            event_sequence: 0,
            generation_method: GenerationMethod::Vector,
        })
    }

    fn generate_promotion(&self, employee: &EnrichedEmployee, year: SimulationYear) -> Option<Event> {
        if !employee.baseline.active || employee.tenure_years < 1 || employee.level_id >= 5 {
            return None;
        }
        let rate = self.parameters.get_parameter("promotion", "base_rate", employee.level_id, 0.08);
        let value = draw(self.seed, &employee.baseline.employee_id, year, Stream::Promotion, None);
        if value >= rate {
            return None;
        }
        let raise = self.parameters.get_parameter("promotion", "promotion_raise", employee.level_id, 0.10);
        let new_level = employee.level_id + 1;
        let new_salary = employee.baseline.compensation * (1.0 + raise);
        let payload = serde_json::json!({
            "old_level": employee.level_id,
            "new_level": new_level,
            "old_salary": employee.baseline.compensation,
            "new_salary": new_salary,
        });
        Some(Event {
            event_id: self.event_id(&employee.baseline.employee_id, year, EventType::Promotion),
            scenario_id: self.scenario_id.clone(),
            plan_design_id: self.plan_design_id.clone(),
            employee_id: employee.baseline.employee_id.clone(),
            event_type: EventType::Promotion,
            effective_date: format!("{}-01-01", year.value()),
            simulation_year: year,
            event_payload: payload,
            event_probability: value,
            event_sequence: 0,
            generation_method: GenerationMethod::Vector,
        })
    }

    fn generate_merit(&self, employee: &EnrichedEmployee, year: SimulationYear) -> Option<Event> {
        if !employee.baseline.active {
            return None;
        }
        let rate = self.parameters.get_parameter("merit", "merit_base", employee.level_id, 0.85);
        let value = draw(self.seed, &employee.baseline.employee_id, year, Stream::Merit, None);
        if value >= rate {
            return None;
        }
        let increase = self.parameters.get_parameter("merit", "merit_increase", employee.level_id, 0.03);
        let new_salary = employee.baseline.compensation * (1.0 + increase);
        let payload = serde_json::json!({
            "old_salary": employee.baseline.compensation,
            "new_salary": new_salary,
        });
        Some(Event {
            event_id: self.event_id(&employee.baseline.employee_id, year, EventType::Merit),
            scenario_id: self.scenario_id.clone(),
            plan_design_id: self.plan_design_id.clone(),
            employee_id: employee.baseline.employee_id.clone(),
            event_type: EventType::Merit,
            effective_date: format!("{}-03-15", year.value()),
            simulation_year: year,
            event_payload: payload,
            event_probability: value,
            event_sequence: 0,
            generation_method: GenerationMethod::Vector,
        })
    }

    fn generate_enrollment(&self, employee: &EnrichedEmployee, year: SimulationYear) -> Option<Event> {
        if !employee.baseline.active || employee.baseline.is_enrolled {
            return None;
        }
        let rate = self.parameters.get_parameter("enrollment", "enrollment_rate", employee.level_id, 0.75);
        let value = draw(self.seed, &employee.baseline.employee_id, year, Stream::Enrollment, None);
        if value >= rate {
            return None;
        }
        let initial_deferral_rate = self.parameters.get_parameter("enrollment", "initial_deferral_rate", employee.level_id, 0.03);
        let payload = serde_json::json!({
            "plan_design_id": self.plan_design_id.as_str(),
            "initial_deferral_rate": initial_deferral_rate,
            "eligibility_status": "eligible",
        });
        Some(Event {
            event_id: self.event_id(&employee.baseline.employee_id, year, EventType::Enrollment),
            scenario_id: self.scenario_id.clone(),
            plan_design_id: self.plan_design_id.clone(),
            employee_id: employee.baseline.employee_id.clone(),
            event_type: EventType::Enrollment,
            effective_date: format!("{}-04-01", year.value()),
            simulation_year: year,
            event_payload: payload,
            event_probability: value,
            event_sequence: 0,
            generation_method: GenerationMethod::Vector,
        })
    }

    /// Generates every event for `year`, in the fixed order `hire,
    /// termination, promotion, merit, enrollment`, then sorts and checks
    /// uniqueness per spec §4.10.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::DuplicateKey`] if two events collide on
    /// `(employee_id, effective_date, event_sequence)`.
    pub fn generate_year(
        &self,
        year: SimulationYear,
        employees: &[EnrichedEmployee],
        target_hires: u32,
    ) -> Result<(Vec<Event>, EventGenerationSummary), EventsError> {
        let mut summary = EventGenerationSummary::default();
        let mut events = self.generate_hires(year, target_hires);
        summary.hires = events.len();

        for employee in employees {
            if let Some(event) = self.generate_termination(employee, year) {
                summary.terminations += 1;
                events.push(event);
            }
        }
        for employee in employees {
            if let Some(event) = self.generate_promotion(employee, year) {
                summary.promotions += 1;
                events.push(event);
            }
        }
        for employee in employees {
            if let Some(event) = self.generate_merit(employee, year) {
                summary.merits += 1;
                events.push(event);
            }
        }
        for employee in employees {
            if let Some(event) = self.generate_enrollment(employee, year) {
                summary.enrollments += 1;
                events.push(event);
            }
        }

        sort_and_check_uniqueness(&mut events)
            .map_err(|(employee_id, date, sequence)| EventsError::DuplicateKey(employee_id, date, sequence))?;
        Ok((events, summary))
    }
}

// ============================================================================
// SECTION: Hybrid Dispatcher
// ============================================================================

/// Runs `EVENT_GENERATION` for `year` through the mode configured, falling
/// back from vector to SQL mode on failure when `fallback_on_error` is set.
///
/// # Errors
///
/// Returns [`EventsError`] if SQL mode's transformation runner fails, or if
/// vector mode fails and no fallback is configured (or the fallback also
/// fails).
pub fn generate_events<R: TransformationRunner>(
    mode: EventGenerationMode,
    fallback_on_error: bool,
    runner: &R,
    event_shards: usize,
    factory: &VectorEventFactory<'_>,
    year: SimulationYear,
    employees: &[EnrichedEmployee],
    target_hires: u32,
) -> Result<EventGenerationSummary, EventsError> {
    match mode {
        EventGenerationMode::Sql => run_sql_mode(runner, event_shards, year).map(|()| EventGenerationSummary::default()),
        EventGenerationMode::Vector => match factory.generate_year(year, employees, target_hires) {
            Ok((_events, summary)) => Ok(summary),
            Err(err) if fallback_on_error => {
                run_sql_mode(runner, event_shards, year)?;
                let _ = err;
                Ok(EventGenerationSummary { fallback_used: true, ..EventGenerationSummary::default() })
            }
            Err(err) => Err(err),
        },
    }
}

fn run_sql_mode<R: TransformationRunner>(runner: &R, event_shards: usize, year: SimulationYear) -> Result<(), EventsError> {
    if event_shards > 1 {
        for shard in 0..event_shards {
            runner.run_stage("events_shard", year, Some(u32::try_from(shard).unwrap_or(u32::MAX)), false)?;
        }
        runner.run_stage("events_union_writer", year, None, false)?;
    } else {
        runner.run_stage("event_generation", year, None, false)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test assertions unwrap generation results directly.")]

    use super::*;
    use navigator_providers::ProcessRunnerConfig;
    use navigator_providers::ProcessTransformationRunner;

    fn employee(id: &str, hire_year: i32, compensation: f64, enrolled: bool) -> EnrichedEmployee {
        let baseline = BaselineEmployee {
            employee_id: EmployeeId::new(id),
            hire_year,
            compensation,
            is_enrolled: enrolled,
            active: true,
        };
        enrich(baseline, SimulationYear::new(2025))
    }

    #[test]
    fn hire_events_match_target_exactly() {
        let parameters = ParameterTable::new(vec![]);
        let factory = VectorEventFactory::new(ScenarioId::new("baseline"), PlanDesignId::new("plan-a"), 1, &parameters);
        let (events, summary) = factory.generate_year(SimulationYear::new(2025), &[], 37).unwrap();
        assert_eq!(summary.hires, 37);
        assert_eq!(events.iter().filter(|event| event.event_type == EventType::Hire).count(), 37);
    }

    #[test]
    fn enrollment_is_skipped_for_already_enrolled_employees() {
        let parameters = ParameterTable::new(vec![]);
        let factory = VectorEventFactory::new(ScenarioId::new("baseline"), PlanDesignId::new("plan-a"), 1, &parameters);
        let employees = vec![employee("EMP-1", 2020, 70_000.0, true)];
        let (events, summary) = factory.generate_year(SimulationYear::new(2025), &employees, 0).unwrap();
        assert_eq!(summary.enrollments, 0);
        assert!(events.iter().all(|event| event.event_type != EventType::Enrollment));
    }

    #[test]
    fn level_five_employees_are_never_promoted() {
        let parameters = ParameterTable::new(vec![]);
        let factory = VectorEventFactory::new(ScenarioId::new("baseline"), PlanDesignId::new("plan-a"), 1, &parameters);
        let employees = vec![employee("EMP-2", 2010, 250_000.0, true)];
        let (events, summary) = factory.generate_year(SimulationYear::new(2025), &employees, 0).unwrap();
        assert_eq!(summary.promotions, 0);
        assert!(events.iter().all(|event| event.event_type != EventType::Promotion));
    }

    #[test]
    fn sql_mode_dispatch_shards_then_writes_the_union() {
        let runner = ProcessTransformationRunner::new(ProcessRunnerConfig {
            command: "true".to_string(),
            ..ProcessRunnerConfig::default()
        });
        let parameters = ParameterTable::new(vec![]);
        let factory = VectorEventFactory::new(ScenarioId::new("baseline"), PlanDesignId::new("plan-a"), 1, &parameters);
        let summary = generate_events(EventGenerationMode::Sql, false, &runner, 2, &factory, SimulationYear::new(2025), &[], 0).unwrap();
        assert!(!summary.fallback_used);
    }
}
