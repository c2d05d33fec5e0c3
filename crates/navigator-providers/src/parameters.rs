// navigator-providers/src/parameters.rs
// ============================================================================
// Module: Parameter Accessor
// Description: Year-scoped lookup of compensation levers with per-level
//              overrides and a required default.
// Purpose: Give the vector-mode event factory a single, deterministic way to
//          read configured parameters without touching wall-clock state.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Parameters are compensation levers (promotion raise, merit increase,
//! termination base rate, and similar) that may vary by event type and by
//! job level. A lookup that finds no override falls back to the caller's
//! default rather than failing, so a run with partial configuration still
//! produces a value for every draw.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A single override for one `(event_type, name, level)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverride {
    /// Event type the override applies to, e.g. `"promotion"`.
    pub event_type: String,
    /// Lever name, e.g. `"promotion_raise"`.
    pub name: String,
    /// Job level the override applies to, or `None` for all levels.
    pub level: Option<u8>,
    /// Override value.
    pub value: f64,
}

/// Year-scoped table of compensation levers.
///
/// Lookups key on `(event_type, name, level)` first, then fall back to
/// `(event_type, name, None)` for an all-levels override, then to the
/// caller-supplied default.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    by_level: HashMap<(String, String, u8), f64>,
    all_levels: HashMap<(String, String), f64>,
}

impl ParameterTable {
    /// Builds a table from a flat list of overrides.
    #[must_use]
    pub fn new(overrides: Vec<ParameterOverride>) -> Self {
        let mut by_level = HashMap::new();
        let mut all_levels = HashMap::new();
        for entry in overrides {
            match entry.level {
                Some(level) => {
                    by_level.insert((entry.event_type, entry.name, level), entry.value);
                }
                None => {
                    all_levels.insert((entry.event_type, entry.name), entry.value);
                }
            }
        }
        Self { by_level, all_levels }
    }

    /// Reads `name` for `event_type` and `level`, falling back to an
    /// all-levels override and finally to `default`.
    #[must_use]
    pub fn get_parameter(&self, event_type: &str, name: &str, level: u8, default: f64) -> f64 {
        if let Some(value) = self.by_level.get(&(event_type.to_string(), name.to_string(), level)) {
            return *value;
        }
        if let Some(value) = self.all_levels.get(&(event_type.to_string(), name.to_string())) {
            return *value;
        }
        default
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_specific_override_wins_over_all_levels_and_default() {
        let table = ParameterTable::new(vec![
            ParameterOverride { event_type: "promotion".to_string(), name: "promotion_raise".to_string(), level: None, value: 0.08 },
            ParameterOverride { event_type: "promotion".to_string(), name: "promotion_raise".to_string(), level: Some(3), value: 0.12 },
        ]);
        assert_eq!(table.get_parameter("promotion", "promotion_raise", 3, 0.05), 0.12);
        assert_eq!(table.get_parameter("promotion", "promotion_raise", 2, 0.05), 0.08);
        assert_eq!(table.get_parameter("promotion", "missing", 2, 0.05), 0.05);
    }

    #[test]
    fn unknown_lever_falls_back_to_default() {
        let table = ParameterTable::new(Vec::new());
        assert_eq!(table.get_parameter("merit", "merit_base", 1, 0.03), 0.03);
    }
}
