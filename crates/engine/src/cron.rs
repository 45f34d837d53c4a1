//! Five-field cron evaluation.
//!
//! Syntax is the standard `minute hour day-of-month month day-of-week`
//! with wildcards, lists, ranges, and step values.  Day-of-week accepts
//! 0–7 where both 0 and 7 mean Sunday.  When both day fields are
//! restricted, a day matches if *either* field matches (Vixie rule).
//!
//! Evaluation is pure, deterministic, and entirely in UTC at minute
//! resolution.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use thiserror::Error;

/// Parse failures for cron expressions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid {field} field: '{value}'")]
    InvalidField {
        field: &'static str,
        value: String,
    },
}

/// `next_after` gives up beyond this horizon.  Any satisfiable expression
/// matches within four years (the leap cycle); one that does not, e.g.
/// `0 0 30 2 *`, never fires.
const HORIZON_DAYS: i64 = 4 * 366;

struct Field {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: Field = Field { name: "minute", min: 0, max: 59 };
const HOUR: Field = Field { name: "hour", min: 0, max: 23 };
const DAY_OF_MONTH: Field = Field { name: "day-of-month", min: 1, max: 31 };
const MONTH: Field = Field { name: "month", min: 1, max: 12 };
const DAY_OF_WEEK: Field = Field { name: "day-of-week", min: 0, max: 7 };

/// A parsed five-field cron expression.
///
/// Each field is a bit set of the values it matches; bit `n` set means
/// value `n` matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    minutes: u64,
    hours: u32,
    dom: u32,
    months: u16,
    dow: u8,
    dom_star: bool,
    dow_star: bool,
}

impl FromStr for Schedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }

        let minutes = parse_field(&MINUTE, fields[0])?;
        let hours = parse_field(&HOUR, fields[1])? as u32;
        let dom = parse_field(&DAY_OF_MONTH, fields[2])? as u32;
        let months = parse_field(&MONTH, fields[3])? as u16;

        // Fold 7 (also Sunday) onto bit 0.
        let mut dow = parse_field(&DAY_OF_WEEK, fields[4])?;
        if dow & (1 << 7) != 0 {
            dow = (dow | 1) & !(1 << 7);
        }

        Ok(Self {
            minutes,
            hours,
            dom,
            months,
            dow: dow as u8,
            dom_star: fields[2] == "*",
            dow_star: fields[4] == "*",
        })
    }
}

impl Schedule {
    /// Whether the expression matches the given instant (at minute
    /// resolution; seconds are ignored).
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        (self.minutes >> t.minute()) & 1 == 1
            && (self.hours >> t.hour()) & 1 == 1
            && (self.months >> t.month()) & 1 == 1
            && self.day_matches(t)
    }

    /// The smallest instant strictly greater than `after` at which the
    /// expression matches, or `None` when no such instant exists within
    /// the search horizon.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut t = truncate_to_minute(after) + Duration::minutes(1);
        let horizon = after + Duration::days(HORIZON_DAYS);

        while t <= horizon {
            if (self.months >> t.month()) & 1 == 0 {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
                continue;
            }
            if !self.day_matches(t) {
                t = truncate_to_day(t) + Duration::days(1);
                continue;
            }
            if (self.hours >> t.hour()) & 1 == 0 {
                t = truncate_to_hour(t) + Duration::hours(1);
                continue;
            }
            if (self.minutes >> t.minute()) & 1 == 0 {
                t += Duration::minutes(1);
                continue;
            }
            return Some(t);
        }

        None
    }

    fn day_matches(&self, t: DateTime<Utc>) -> bool {
        let dom_hit = (self.dom >> t.day()) & 1 == 1;
        let dow_hit = (self.dow >> t.weekday().num_days_from_sunday()) & 1 == 1;
        match (self.dom_star, self.dow_star) {
            // Both restricted: either field may claim the day.
            (false, false) => dom_hit || dow_hit,
            _ => dom_hit && dow_hit,
        }
    }
}

/// Parse one field into its bit set.
fn parse_field(field: &Field, input: &str) -> Result<u64, CronError> {
    let invalid = || CronError::InvalidField {
        field: field.name,
        value: input.to_string(),
    };

    let mut mask = 0u64;
    for part in input.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().ok().filter(|s| *s > 0).ok_or_else(invalid)?;
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (field.min, field.max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            let lo = parse_value(field, lo).ok_or_else(invalid)?;
            let hi = parse_value(field, hi).ok_or_else(invalid)?;
            if lo > hi {
                return Err(invalid());
            }
            (lo, hi)
        } else {
            let value = parse_value(field, range).ok_or_else(invalid)?;
            // A bare value with a step (`5/10`) runs to the field maximum.
            if step > 1 { (value, field.max) } else { (value, value) }
        };

        let mut value = lo;
        while value <= hi {
            mask |= 1u64 << value;
            value += step;
        }
    }

    if mask == 0 {
        return Err(invalid());
    }
    Ok(mask)
}

fn parse_value(field: &Field, s: &str) -> Option<u32> {
    let value: u32 = s.parse().ok()?;
    (field.min..=field.max).contains(&value).then_some(value)
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::seconds(t.second() as i64) - Duration::nanoseconds(t.nanosecond() as i64)
}

fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    truncate_to_minute(t) - Duration::minutes(t.minute() as i64)
}

fn truncate_to_day(t: DateTime<Utc>) -> DateTime<Utc> {
    truncate_to_hour(t) - Duration::hours(t.hour() as i64)
}
