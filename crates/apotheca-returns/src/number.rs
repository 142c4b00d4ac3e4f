//! # Return Number Generation
//!
//! Builds the human-facing return numbers clerks read out over the phone.
//!
//! ## Format
//! ```text
//! RET-PHX-2608-0042
//!  │   │    │    │
//!  │   │    │    └─ per-(store, period) sequence, zero-padded to 4
//!  │   │    └─ period tag: two-digit year + month (Aug 2026)
//!  │   └─ store prefix: first 3 alphanumerics of the store code
//!  └─ fixed tag
//! ```
//!
//! Sequences come from the `return_counters` UPSERT inside the creation
//! transaction. If the counter cannot be bumped, the engine falls back to a
//! timestamp-derived sequence instead of refusing the return. Fallback
//! sequences are always six digits wide, so the two families cannot collide
//! with each other no matter how the counter advances.

use chrono::{DateTime, Utc};

/// Derives the 3-character store prefix from a store code.
///
/// Takes the first three ASCII alphanumerics, uppercased. Codes shorter
/// than that are padded with `X` so the number keeps its shape.
pub fn store_prefix(code: &str) -> String {
    let mut prefix: String = code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    while prefix.len() < 3 {
        prefix.push('X');
    }

    prefix
}

/// Period tag for the given instant: two-digit year then two-digit month.
pub fn period_tag(now: DateTime<Utc>) -> String {
    now.format("%y%m").to_string()
}

/// Assembles a return number from its parts.
///
/// Sequences below 10000 are zero-padded to four digits; larger ones
/// (the timestamp fallbacks) print at their natural width.
pub fn format_return_number(prefix: &str, period: &str, seq: i64) -> String {
    format!("RET-{prefix}-{period}-{seq:04}")
}

/// Timestamp-derived sequence used when the counter UPSERT fails.
///
/// Always lands in 100000..=999999: six digits, so it can never look like
/// a counter-issued four-digit sequence.
pub fn fallback_sequence(now: DateTime<Utc>) -> i64 {
    100_000 + now.timestamp_millis().rem_euclid(900_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_store_prefix_normalizes() {
        assert_eq!(store_prefix("PHX"), "PHX");
        assert_eq!(store_prefix("phx"), "PHX");
        assert_eq!(store_prefix("Lahore-3"), "LAH");
        assert_eq!(store_prefix("st-9"), "ST9");
        assert_eq!(store_prefix("a"), "AXX");
        assert_eq!(store_prefix(""), "XXX");
    }

    #[test]
    fn test_period_tag_is_year_month() {
        let aug = Utc.with_ymd_and_hms(2026, 8, 23, 10, 30, 0).unwrap();
        assert_eq!(period_tag(aug), "2608");

        let jan = Utc.with_ymd_and_hms(2027, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(period_tag(jan), "2701");
    }

    #[test]
    fn test_format_zero_pads_counter_sequences() {
        assert_eq!(format_return_number("PHX", "2608", 7), "RET-PHX-2608-0007");
        assert_eq!(format_return_number("PHX", "2608", 42), "RET-PHX-2608-0042");
        assert_eq!(
            format_return_number("PHX", "2608", 12345),
            "RET-PHX-2608-12345"
        );
    }

    #[test]
    fn test_fallback_sequence_is_always_six_digits() {
        let instants = [
            Utc.with_ymd_and_hms(2026, 8, 23, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 8, 23, 23, 59, 59).unwrap(),
            Utc.timestamp_opt(0, 0).unwrap(),
        ];

        for now in instants {
            let seq = fallback_sequence(now);
            assert!(
                (100_000..=999_999).contains(&seq),
                "fallback {seq} out of six-digit range"
            );
        }
    }
}
