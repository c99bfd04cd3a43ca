use proptest::prelude::*;

use super::*;

proptest! {
    // A suffixed field is always the raw value times its unit factor.
    #[test]
    fn prop_suffix_scaling(value in 0u64..1_000_000) {
        let ms = normalize(Some(&format!("{value}MS")), None, None, false);
        let us = normalize(Some(&format!("{value}US")), None, None, false);
        let ns = normalize(Some(&format!("{value}NS")), None, None, false);
        let raw = normalize(Some(&value.to_string()), None, None, false);

        prop_assert_eq!(ms.start_ns, value * SCALE_MS);
        prop_assert_eq!(us.start_ns, value * SCALE_US);
        prop_assert_eq!(ns.start_ns, value * SCALE_NS);
        prop_assert_eq!(raw.start_ns, value);
    }

    // Legacy normalization and per-field normalization agree when every
    // field is written in milliseconds.
    #[test]
    fn prop_legacy_matches_per_field_for_ms(
        start in 0u64..10_000,
        stop in 0u64..10_000,
        step in 0u64..10_000,
    ) {
        let timer = format!("{start}MS");
        let duration = format!("{stop}MS");
        let interval = format!("{step}MS");

        let modern = normalize(Some(&timer), Some(&duration), Some(&interval), false);
        let legacy = normalize(Some(&timer), Some(&duration), Some(&interval), true);
        prop_assert_eq!(modern, legacy);
    }

    // An open window always means strictly between start and stop.
    #[test]
    fn prop_window_strictness(
        start in 0u64..1_000_000,
        len in 0u64..1_000_000,
        now in 0u64..2_000_000,
    ) {
        let w = TriggerWindow { start_ns: start, stop_ns: start + len, interval_ns: 0 };
        prop_assert_eq!(w.is_open(now), now > start && now < start + len);
    }

    // An intermittent firing implies the window was open and the phase
    // index was even.
    #[test]
    fn prop_intermittent_firing_implies_even_phase(
        now in 0u64..1_000_000,
        interval in 1u64..10_000,
    ) {
        let w = TriggerWindow { start_ns: 0, stop_ns: 1_000_000, interval_ns: interval };
        let d = evaluate(
            Trigger::Access,
            Some(Persistence::Intermittent),
            &w,
            now,
            0,
            None,
        );
        if d == Decision::Fire(Firing::Windowed) {
            prop_assert!(w.is_open(now));
            prop_assert_eq!((now / interval) % 2, 0);
        }
    }

    // Permanent faults fire at any instant, under any window.
    #[test]
    fn prop_permanent_ignores_the_window(
        start in 0u64..1_000,
        stop in 0u64..1_000,
        now in 0u64..10_000,
    ) {
        let w = TriggerWindow { start_ns: start, stop_ns: stop, interval_ns: 0 };
        let d = evaluate(Trigger::Time, Some(Persistence::Permanent), &w, now, 0, None);
        prop_assert_eq!(d, Decision::Fire(Firing::Permanent));
    }
}
