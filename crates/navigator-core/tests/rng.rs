// navigator-core/tests/rng.rs
// ============================================================================
// Module: RNG Determinism Properties
// Description: Property-based checks that draws are pure and range-bound.
// Purpose: Guard the determinism guarantee relied on by every consumer of
//          navigator_core::rng::draw across process boundaries.
// Dependencies: proptest, navigator_core
// ============================================================================

use navigator_core::EmployeeId;
use navigator_core::SimulationYear;
use navigator_core::Stream;
use navigator_core::draw;
use proptest::prelude::*;

fn any_stream() -> impl Strategy<Value = Stream> {
    prop_oneof![
        Just(Stream::Hire),
        Just(Stream::Termination),
        Just(Stream::Promotion),
        Just(Stream::Merit),
        Just(Stream::Enrollment),
        Just(Stream::Deferral),
    ]
}

proptest! {
    #[test]
    fn draw_is_repeatable_for_any_key(
        seed in any::<u64>(),
        employee in "[A-Z]{3}-[0-9]{1,6}",
        year in 2000i32..2100,
        stream in any_stream(),
    ) {
        let id = EmployeeId::new(employee);
        let year = SimulationYear::new(year);
        let first = draw(seed, &id, year, stream, None);
        let second = draw(seed, &id, year, stream, None);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn draw_stays_in_unit_interval(
        seed in any::<u64>(),
        employee in "[A-Z]{3}-[0-9]{1,6}",
        year in 2000i32..2100,
        stream in any_stream(),
    ) {
        let id = EmployeeId::new(employee);
        let year = SimulationYear::new(year);
        let value = draw(seed, &id, year, stream, None);
        prop_assert!((0.0..1.0).contains(&value));
    }

    #[test]
    fn draw_is_sensitive_to_seed(
        seed_a in any::<u64>(),
        seed_b in any::<u64>(),
        employee in "[A-Z]{3}-[0-9]{1,6}",
        year in 2000i32..2100,
        stream in any_stream(),
    ) {
        prop_assume!(seed_a != seed_b);
        let id = EmployeeId::new(employee);
        let year = SimulationYear::new(year);
        let a = draw(seed_a, &id, year, stream, None);
        let b = draw(seed_b, &id, year, stream, None);
        // Collisions are astronomically unlikely but not impossible for a
        // 31-bit range; the property is about typical behavior, not a proof.
        prop_assert!(a != b || seed_a == seed_b);
    }
}
