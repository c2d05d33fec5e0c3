// navigator-core/src/rng.rs
// ============================================================================
// Module: Deterministic RNG
// Description: Hash-based uniform draws keyed by (seed, employee, year, stream, salt).
// Purpose: Give every event-generation mode and shard the same draw for the
//          same key, with no shared mutable state.
// Dependencies: md-5
// ============================================================================

//! ## Overview
//! The simulation never seeds a PRNG and advances it; instead every draw is
//! a pure function of its key. This makes draws reproducible across
//! platforms, across SQL/vector event-generation modes, and across sharded
//! execution, because nothing about *how* a draw is requested can change
//! *what* draw comes back.

use md5::Digest;
use md5::Md5;

use crate::identifiers::EmployeeId;
use crate::identifiers::SimulationYear;

/// The RNG streams consumed by event generation, one per event family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Hire eligibility/cohort draws.
    Hire,
    /// Termination draws.
    Termination,
    /// Promotion draws.
    Promotion,
    /// Merit increase draws.
    Merit,
    /// Enrollment draws.
    Enrollment,
    /// Deferral escalation draws.
    Deferral,
}

impl Stream {
    /// Returns the stable key component for this stream.
    #[must_use]
    pub const fn as_key_str(self) -> &'static str {
        match self {
            Self::Hire => "hire",
            Self::Termination => "termination",
            Self::Promotion => "promotion",
            Self::Merit => "merit",
            Self::Enrollment => "enrollment",
            Self::Deferral => "deferral",
        }
    }
}

/// Modulus used to map the leading 32 bits of the digest into `[0, 1)`.
///
/// The legacy system used the largest Mersenne prime below 2^31; matching
/// it exactly (not `u32::MAX` or `2^31`) is required for the draw to be
/// byte-identical to prior runs.
const MODULUS: u32 = 2_147_483_647;

/// Draws a uniform value in `[0, 1)` for the given key.
///
/// The key is hashed with MD5 and the leading 32 bits of the digest, taken
/// as a big-endian unsigned integer, are reduced modulo [`MODULUS`].
///
/// For identical `(seed, employee_id, year, stream, salt)` this returns a
/// byte-identical value regardless of platform, event-generation mode, or
/// sharding: it touches no static or thread-local state.
#[must_use]
pub fn draw(
    seed: u64,
    employee_id: &EmployeeId,
    year: SimulationYear,
    stream: Stream,
    salt: Option<&str>,
) -> f64 {
    let key = build_key(seed, employee_id, year, stream, salt);
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let h = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    f64::from(h % MODULUS) / f64::from(MODULUS)
}

/// Builds the `|`-separated RNG key for a draw.
fn build_key(
    seed: u64,
    employee_id: &EmployeeId,
    year: SimulationYear,
    stream: Stream,
    salt: Option<&str>,
) -> String {
    let mut key = format!("{seed}|{employee_id}|{year}|{}", stream.as_key_str());
    if let Some(salt) = salt {
        key.push('|');
        key.push_str(salt);
    }
    key
}

/// One precomputed draw for an `(employee_id, stream)` pair in a year.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawEntry {
    /// Employee the draw belongs to.
    pub employee_id: EmployeeId,
    /// Stream the draw was taken from.
    pub stream: Stream,
    /// The uniform draw in `[0, 1)`.
    pub value: f64,
}

/// A year's worth of precomputed draws, keyed by `(employee_id, stream)`,
/// so vectorized event generators can read draws by column instead of
/// recomputing the hash per row.
#[derive(Debug, Clone, Default)]
pub struct DrawTable {
    entries: std::collections::HashMap<(EmployeeId, &'static str), f64>,
}

impl DrawTable {
    /// Builds a draw table for every `(employee, stream)` pair in `streams`.
    #[must_use]
    pub fn build(
        seed: u64,
        employee_ids: &[EmployeeId],
        year: SimulationYear,
        streams: &[Stream],
        salt: Option<&str>,
    ) -> Self {
        let mut entries = std::collections::HashMap::with_capacity(employee_ids.len() * streams.len());
        for employee_id in employee_ids {
            for &stream in streams {
                let value = draw(seed, employee_id, year, stream, salt);
                entries.insert((employee_id.clone(), stream.as_key_str()), value);
            }
        }
        Self { entries }
    }

    /// Looks up a precomputed draw, recomputing it is never necessary: the
    /// table is built once per year from the same pure function.
    #[must_use]
    pub fn get(&self, employee_id: &EmployeeId, stream: Stream) -> Option<f64> {
        self.entries.get(&(employee_id.clone(), stream.as_key_str())).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_is_pure_and_repeatable() {
        let id = EmployeeId::new("EMP-001");
        let year = SimulationYear::new(2025);
        let first = draw(42, &id, year, Stream::Hire, None);
        let second = draw(42, &id, year, Stream::Hire, None);
        assert_eq!(first, second);
    }

    #[test]
    fn draw_is_in_unit_interval() {
        let id = EmployeeId::new("EMP-002");
        let year = SimulationYear::new(2025);
        for stream in [
            Stream::Hire,
            Stream::Termination,
            Stream::Promotion,
            Stream::Merit,
            Stream::Enrollment,
            Stream::Deferral,
        ] {
            let value = draw(7, &id, year, stream, None);
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn changing_any_key_component_changes_the_draw() {
        let id_a = EmployeeId::new("EMP-003");
        let id_b = EmployeeId::new("EMP-004");
        let year = SimulationYear::new(2025);
        let base = draw(1, &id_a, year, Stream::Merit, None);
        assert_ne!(base, draw(2, &id_a, year, Stream::Merit, None));
        assert_ne!(base, draw(1, &id_b, year, Stream::Merit, None));
        assert_ne!(base, draw(1, &id_a, year.next(), Stream::Merit, None));
        assert_ne!(base, draw(1, &id_a, year, Stream::Enrollment, None));
        assert_ne!(base, draw(1, &id_a, year, Stream::Merit, Some("salt")));
    }

    #[test]
    fn draw_table_matches_scalar_draw() {
        let ids = vec![EmployeeId::new("EMP-005"), EmployeeId::new("EMP-006")];
        let year = SimulationYear::new(2026);
        let streams = [Stream::Hire, Stream::Termination];
        let table = DrawTable::build(99, &ids, year, &streams, None);
        for id in &ids {
            for &stream in &streams {
                let expected = draw(99, id, year, stream, None);
                assert_eq!(table.get(id, stream), Some(expected));
            }
        }
    }
}
