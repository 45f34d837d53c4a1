//! Tests for the five-field cron evaluator.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::cron::{CronError, Schedule};

fn schedule(expr: &str) -> Schedule {
    expr.parse().expect("expression should parse")
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

// ============================================================
// Parsing
// ============================================================

#[test]
fn rejects_wrong_field_count() {
    assert_eq!("* * * *".parse::<Schedule>(), Err(CronError::FieldCount(4)));
    assert_eq!("* * * * * *".parse::<Schedule>(), Err(CronError::FieldCount(6)));
    assert_eq!("not a cron".parse::<Schedule>(), Err(CronError::FieldCount(3)));
    assert_eq!("".parse::<Schedule>(), Err(CronError::FieldCount(0)));
}

#[test]
fn rejects_out_of_range_values() {
    for expr in ["60 * * * *", "* 24 * * *", "* * 0 * *", "* * 32 * *", "* * * 13 *", "* * * 0 *", "* * * * 8"] {
        assert!(
            matches!(expr.parse::<Schedule>(), Err(CronError::InvalidField { .. })),
            "{expr} should be rejected"
        );
    }
}

#[test]
fn rejects_garbage_fields() {
    for expr in ["a b c d e", "*/x * * * *", "1--5 * * * *", "1,,2 * * * *"] {
        assert!(expr.parse::<Schedule>().is_err(), "{expr} should be rejected");
    }
}

#[test]
fn rejects_zero_step() {
    assert!(matches!(
        "*/0 * * * *".parse::<Schedule>(),
        Err(CronError::InvalidField { field: "minute", .. })
    ));
}

#[test]
fn rejects_inverted_range() {
    assert!("30-10 * * * *".parse::<Schedule>().is_err());
}

#[test]
fn accepts_wildcards_lists_ranges_and_steps() {
    for expr in [
        "* * * * *",
        "*/5 * * * *",
        "0,15,30,45 * * * *",
        "0 9-17 * * *",
        "10-50/10 * * * *",
        "0 0 1 1 0",
        "30 2 */2 * *",
    ] {
        assert!(expr.parse::<Schedule>().is_ok(), "{expr} should parse");
    }
}

// ============================================================
// matches
// ============================================================

#[test]
fn matches_is_minute_resolution() {
    let s = schedule("30 14 * * *");
    assert!(s.matches(at(2025, 3, 1, 14, 30)));
    // Seconds are ignored.
    assert!(s.matches(Utc.with_ymd_and_hms(2025, 3, 1, 14, 30, 59).unwrap()));
    assert!(!s.matches(at(2025, 3, 1, 14, 31)));
    assert!(!s.matches(at(2025, 3, 1, 15, 30)));
}

// ============================================================
// next_after
// ============================================================

#[test]
fn every_minute_advances_by_one_minute() {
    let s = schedule("* * * * *");
    let next = s.next_after(at(2025, 3, 1, 12, 0)).unwrap();
    assert_eq!(next, at(2025, 3, 1, 12, 1));
}

#[test]
fn next_is_strictly_greater_even_when_the_reference_matches() {
    let s = schedule("0 * * * *");
    let next = s.next_after(at(2025, 3, 1, 12, 0)).unwrap();
    assert_eq!(next, at(2025, 3, 1, 13, 0));
}

#[test]
fn mid_minute_reference_resolves_to_the_next_boundary() {
    let s = schedule("* * * * *");
    let reference = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 30).unwrap();
    assert_eq!(s.next_after(reference).unwrap(), at(2025, 3, 1, 12, 1));
}

#[test]
fn five_minute_steps_are_300_seconds_apart() {
    let s = schedule("*/5 * * * *");
    let mut t = at(2025, 3, 1, 0, 2);
    let mut previous = None;
    for _ in 0..24 {
        let next = s.next_after(t).unwrap();
        if let Some(previous) = previous {
            assert_eq!(next - previous, Duration::seconds(300));
        }
        previous = Some(next);
        t = next;
    }
}

#[test]
fn specific_minute_and_hour() {
    let s = schedule("30 14 * * *");
    assert_eq!(s.next_after(at(2025, 3, 1, 10, 0)).unwrap(), at(2025, 3, 1, 14, 30));
    // Past today's slot: tomorrow.
    assert_eq!(s.next_after(at(2025, 3, 1, 14, 30)).unwrap(), at(2025, 3, 2, 14, 30));
}

#[test]
fn hour_ranges_wrap_to_the_next_day() {
    let s = schedule("0 9-17 * * *");
    assert_eq!(s.next_after(at(2025, 3, 1, 17, 0)).unwrap(), at(2025, 3, 2, 9, 0));
    assert_eq!(s.next_after(at(2025, 3, 1, 12, 30)).unwrap(), at(2025, 3, 1, 13, 0));
}

#[test]
fn lists_pick_the_nearest_member() {
    let s = schedule("0,30 * * * *");
    assert_eq!(s.next_after(at(2025, 3, 1, 12, 0)).unwrap(), at(2025, 3, 1, 12, 30));
    assert_eq!(s.next_after(at(2025, 3, 1, 12, 30)).unwrap(), at(2025, 3, 1, 13, 0));
}

#[test]
fn stepped_range_only_hits_its_members() {
    // Minutes 10, 25, 40.
    let s = schedule("10-40/15 * * * *");
    assert_eq!(s.next_after(at(2025, 3, 1, 12, 10)).unwrap(), at(2025, 3, 1, 12, 25));
    assert_eq!(s.next_after(at(2025, 3, 1, 12, 40)).unwrap(), at(2025, 3, 1, 13, 10));
}

#[test]
fn month_rollover_lands_on_the_first_matching_day() {
    let s = schedule("0 0 1 1 *");
    assert_eq!(s.next_after(at(2025, 3, 1, 0, 0)).unwrap(), at(2026, 1, 1, 0, 0));
}

#[test]
fn day_31_skips_short_months() {
    let s = schedule("0 0 31 * *");
    // April has 30 days; from April 1 the next 31st is May 31.
    assert_eq!(s.next_after(at(2025, 4, 1, 0, 0)).unwrap(), at(2025, 5, 31, 0, 0));
}

#[test]
fn day_of_week_matching() {
    // 2025-03-01 is a Saturday; the next Monday is the 3rd.
    let s = schedule("0 0 * * 1");
    assert_eq!(s.next_after(at(2025, 3, 1, 0, 0)).unwrap(), at(2025, 3, 3, 0, 0));
}

#[test]
fn day_of_week_seven_is_sunday() {
    let sunday_as_0 = schedule("0 0 * * 0");
    let sunday_as_7 = schedule("0 0 * * 7");
    let reference = at(2025, 3, 1, 0, 0);
    assert_eq!(sunday_as_0.next_after(reference), sunday_as_7.next_after(reference));
    // 2025-03-02 is a Sunday.
    assert_eq!(sunday_as_0.next_after(reference).unwrap(), at(2025, 3, 2, 0, 0));
}

#[test]
fn restricted_dom_and_dow_match_either() {
    // Day 13 of the month, or any Friday.
    let s = schedule("0 0 13 * 5");
    // 2025-03-01 is a Saturday; the first Friday is March 7, before the 13th.
    assert_eq!(s.next_after(at(2025, 3, 1, 0, 0)).unwrap(), at(2025, 3, 7, 0, 0));
    // After Friday the 7th comes the 13th (a Thursday).
    assert_eq!(s.next_after(at(2025, 3, 7, 0, 0)).unwrap(), at(2025, 3, 13, 0, 0));
}

#[test]
fn leap_day_resolves_to_the_next_leap_year() {
    let s = schedule("0 0 29 2 *");
    assert_eq!(s.next_after(at(2025, 3, 1, 0, 0)).unwrap(), at(2028, 2, 29, 0, 0));
}

#[test]
fn impossible_date_returns_none() {
    let s = schedule("0 0 30 2 *");
    assert_eq!(s.next_after(at(2025, 1, 1, 0, 0)), None);
}

// ============================================================
// Properties
// ============================================================

#[test]
fn next_after_is_monotone_in_the_reference() {
    let expressions = ["* * * * *", "*/5 * * * *", "30 14 * * *", "0 0 1 * *", "0 9 * * 1-5"];
    let base = at(2025, 3, 1, 0, 0);
    for expr in expressions {
        let s = schedule(expr);
        let mut previous = s.next_after(base).unwrap();
        for offset in (0..72i64).map(Duration::hours) {
            let next = s.next_after(base + offset).unwrap();
            assert!(next >= previous, "{expr}: next_after went backwards");
            previous = next;
        }
    }
}

#[test]
fn next_run_is_the_successor_of_its_own_parse() {
    // For any computed next_run, evaluating just before it yields it again.
    let expressions = ["*/5 * * * *", "30 14 * * *", "0 0 13 * 5", "0 9 * * 1-5"];
    let base = at(2025, 3, 1, 7, 11);
    for expr in expressions {
        let s = schedule(expr);
        let next = s.next_after(base).unwrap();
        assert_eq!(
            s.next_after(next - Duration::minutes(1)),
            Some(next),
            "{expr}: next_run is not its own successor"
        );
    }
}
