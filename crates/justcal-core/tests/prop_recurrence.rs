//! Property-based tests for recurrence translation using proptest.
//!
//! These tests verify invariants that should hold for *any* phrase of a
//! recognized shape, not just the specific examples in `recurrence_tests.rs`.

use justcal_core::recurrence::WEEKDAYS;
use justcal_core::translate;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_day_name() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop::sample::select(WEEKDAYS.to_vec())
}

fn arb_unit() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop_oneof![
        Just(("day", "DAILY")),
        Just(("week", "WEEKLY")),
        Just(("month", "MONTHLY")),
        Just(("year", "YEARLY")),
    ]
}

/// Randomly flip the case of each ASCII letter.
fn arb_casing(text: &'static str) -> impl Strategy<Value = String> {
    prop::collection::vec(any::<bool>(), text.len()).prop_map(move |flips| {
        text.chars()
            .zip(flips)
            .map(|(c, upper)| {
                if upper {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Every rule starts with a FREQ clause.
    #[test]
    fn rules_start_with_freq(input in "[ -~]{0,40}") {
        if let Some(rule) = translate(Some(&input)) {
            prop_assert!(rule.starts_with("FREQ="), "rule {rule:?} for {input:?}");
        }
    }

    /// Translating a rule again leaves it unchanged.
    #[test]
    fn output_is_a_fixed_point(input in "[ -~]{0,40}") {
        if let Some(rule) = translate(Some(&input)) {
            prop_assert_eq!(translate(Some(&rule)), Some(rule));
        }
    }

    /// Casing never changes the result.
    #[test]
    fn weekly_on_day_is_case_insensitive(
        (name, code) in arb_day_name(),
        prefix in arb_casing("weekly on "),
    ) {
        let phrase = format!("{prefix}{}", name.to_uppercase());
        prop_assert_eq!(translate(Some(&phrase)), Some(format!("FREQ=WEEKLY;BYDAY={code}")));
    }

    /// Two days come out in the order given.
    #[test]
    fn two_days_keep_user_order(
        (first, first_code) in arb_day_name(),
        (second, second_code) in arb_day_name(),
    ) {
        let phrase = format!("weekly on {first} and {second}");
        prop_assert_eq!(
            translate(Some(&phrase)),
            Some(format!("FREQ=WEEKLY;BYDAY={first_code},{second_code}"))
        );
    }

    /// An unknown day anywhere in the phrase fails the whole phrase.
    #[test]
    fn unknown_day_poisons_phrase(
        (known, _) in arb_day_name(),
        bogus in "[qxz]{4,8}",
        bogus_first in any::<bool>(),
    ) {
        let phrase = if bogus_first {
            format!("weekly on {bogus} and {known}")
        } else {
            format!("weekly on {known} and {bogus}")
        };
        prop_assert_eq!(translate(Some(&phrase)), None);
    }

    /// Every valid day of month is accepted, with or without a suffix.
    #[test]
    fn month_days_in_range(day in 1u32..=31, suffix in prop::sample::select(vec!["", "st", "nd", "rd", "th"])) {
        let phrase = format!("monthly on the {day}{suffix}");
        prop_assert_eq!(translate(Some(&phrase)), Some(format!("FREQ=MONTHLY;BYMONTHDAY={day}")));
    }

    /// Days of month past 31 are rejected.
    #[test]
    fn month_days_out_of_range(day in 32u32..10_000) {
        let phrase = format!("monthly on the {day}th");
        prop_assert_eq!(translate(Some(&phrase)), None);
    }

    /// `every N <unit>` maps to FREQ + INTERVAL for singular and plural units.
    #[test]
    fn every_interval(n in 1u32..=1000, (unit, freq) in arb_unit(), plural in any::<bool>()) {
        let unit = if plural { format!("{unit}s") } else { unit.to_string() };
        let phrase = format!("every {n} {unit}");
        prop_assert_eq!(translate(Some(&phrase)), Some(format!("FREQ={freq};INTERVAL={n}")));
    }

    /// Raw rules come back uppercased and otherwise untouched.
    #[test]
    fn passthrough_uppercases(tail in "[a-z0-9=;,]{0,30}") {
        let raw = format!("freq={tail}");
        prop_assert_eq!(translate(Some(&raw)), Some(raw.to_uppercase()));
    }
}
