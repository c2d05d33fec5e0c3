// sim-logic/src/tristate.rs
// ============================================================================
// Module: Tri-State Logic
// Description: Tri-state truth values and configurable logic tables.
// Purpose: Provide deterministic tri-state evaluation for folding validation
//          rule outcomes into a single year-level decision.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Defines tri-state truth values (`true`/`false`/`unknown`) and logic
//! tables that can be swapped to match domain needs. The default logic is
//! strong Kleene, which preserves fail-closed semantics when a rule's
//! outcome is advisory rather than a hard pass/fail.

use serde::Deserialize;
use serde::Serialize;

/// Tri-state truth value for rule-outcome folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriState {
    /// Definitively true.
    True,
    /// Definitively false.
    False,
    /// Advisory only; does not by itself block a decision.
    Unknown,
}

impl TriState {
    /// Returns `true` if the value is `True`.
    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// Returns `true` if the value is `False`.
    #[must_use]
    pub const fn is_false(self) -> bool {
        matches!(self, Self::False)
    }

    /// Returns `true` if the value is `Unknown`.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

/// Aggregated counts for group evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCounts {
    /// Number of satisfied members.
    pub satisfied: usize,
    /// Number of unknown members.
    pub unknown: usize,
    /// Total number of members in the group.
    pub total: usize,
}

impl GroupCounts {
    /// Returns the number of definitively failed members.
    #[must_use]
    pub const fn failed(self) -> usize {
        self.total.saturating_sub(self.satisfied + self.unknown)
    }
}

/// Tri-state logic tables for composable evaluation.
pub trait TriLogic {
    /// Logical AND for tri-state values.
    fn and(&self, lhs: TriState, rhs: TriState) -> TriState;

    /// Logical OR for tri-state values.
    fn or(&self, lhs: TriState, rhs: TriState) -> TriState;

    /// Logical NOT for tri-state values.
    fn not(&self, value: TriState) -> TriState;

    /// Group evaluation semantics: `true` once `min` members are
    /// satisfied, `false` once satisfying `min` becomes impossible,
    /// `unknown` otherwise.
    fn require_group(&self, min: u8, counts: GroupCounts) -> TriState {
        let min_required = usize::from(min);
        if min_required == 0 {
            return TriState::True;
        }
        if counts.satisfied >= min_required {
            return TriState::True;
        }
        if counts.satisfied + counts.unknown < min_required {
            return TriState::False;
        }
        TriState::Unknown
    }
}

/// Strong Kleene logic (default): an `Unknown` operand yields `Unknown`
/// unless the other operand alone determines the result (e.g. `False AND
/// Unknown = False`).
#[derive(Debug, Clone, Copy)]
pub struct KleeneLogic;

impl TriLogic for KleeneLogic {
    fn and(&self, lhs: TriState, rhs: TriState) -> TriState {
        match (lhs, rhs) {
            (TriState::False, _) | (_, TriState::False) => TriState::False,
            (TriState::True, TriState::True) => TriState::True,
            _ => TriState::Unknown,
        }
    }

    fn or(&self, lhs: TriState, rhs: TriState) -> TriState {
        match (lhs, rhs) {
            (TriState::True, _) | (_, TriState::True) => TriState::True,
            (TriState::False, TriState::False) => TriState::False,
            _ => TriState::Unknown,
        }
    }

    fn not(&self, value: TriState) -> TriState {
        match value {
            TriState::True => TriState::False,
            TriState::False => TriState::True,
            TriState::Unknown => TriState::Unknown,
        }
    }
}

/// Bochvar logic (infectious unknowns): any `Unknown` operand forces an
/// `Unknown` result.
#[derive(Debug, Clone, Copy)]
pub struct BochvarLogic;

impl TriLogic for BochvarLogic {
    fn and(&self, lhs: TriState, rhs: TriState) -> TriState {
        match (lhs, rhs) {
            (TriState::Unknown, _) | (_, TriState::Unknown) => TriState::Unknown,
            (TriState::False, _) | (_, TriState::False) => TriState::False,
            _ => TriState::True,
        }
    }

    fn or(&self, lhs: TriState, rhs: TriState) -> TriState {
        match (lhs, rhs) {
            (TriState::Unknown, _) | (_, TriState::Unknown) => TriState::Unknown,
            (TriState::True, _) | (_, TriState::True) => TriState::True,
            _ => TriState::False,
        }
    }

    fn not(&self, value: TriState) -> TriState {
        match value {
            TriState::True => TriState::False,
            TriState::False => TriState::True,
            TriState::Unknown => TriState::Unknown,
        }
    }
}

/// Runtime-selectable logic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicMode {
    /// Strong Kleene logic (default).
    Kleene,
    /// Bochvar logic (infectious unknowns).
    Bochvar,
}

impl TriLogic for LogicMode {
    fn and(&self, lhs: TriState, rhs: TriState) -> TriState {
        match self {
            Self::Kleene => KleeneLogic.and(lhs, rhs),
            Self::Bochvar => BochvarLogic.and(lhs, rhs),
        }
    }

    fn or(&self, lhs: TriState, rhs: TriState) -> TriState {
        match self {
            Self::Kleene => KleeneLogic.or(lhs, rhs),
            Self::Bochvar => BochvarLogic.or(lhs, rhs),
        }
    }

    fn not(&self, value: TriState) -> TriState {
        match self {
            Self::Kleene => KleeneLogic.not(value),
            Self::Bochvar => BochvarLogic.not(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kleene_and_is_false_dominant() {
        assert_eq!(KleeneLogic.and(TriState::False, TriState::Unknown), TriState::False);
        assert_eq!(KleeneLogic.and(TriState::True, TriState::Unknown), TriState::Unknown);
        assert_eq!(KleeneLogic.and(TriState::True, TriState::True), TriState::True);
    }

    #[test]
    fn bochvar_and_is_unknown_dominant() {
        assert_eq!(BochvarLogic.and(TriState::False, TriState::Unknown), TriState::Unknown);
        assert_eq!(BochvarLogic.and(TriState::True, TriState::True), TriState::True);
    }

    #[test]
    fn require_group_thresholds() {
        let logic = KleeneLogic;
        assert_eq!(
            logic.require_group(2, GroupCounts { satisfied: 2, unknown: 0, total: 3 }),
            TriState::True
        );
        assert_eq!(
            logic.require_group(2, GroupCounts { satisfied: 0, unknown: 0, total: 3 }),
            TriState::False
        );
        assert_eq!(
            logic.require_group(2, GroupCounts { satisfied: 1, unknown: 1, total: 3 }),
            TriState::Unknown
        );
    }
}
