//! Date parsing and normalization.
//!
//! Invoice dates arrive in many shapes (`01/15/2024`, `2024-01-15`,
//! `January 15, 2024`, OCR fragments). Parsing tries an ordered list of
//! format strings before a last-resort digit-group heuristic, and the
//! canonical output format is always `MM/DD/YYYY`.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

/// Maximum days in the future a plausible invoice date may fall.
pub const MAX_FUTURE_DAYS: i64 = 365;

/// Maximum days in the past a plausible invoice date may fall.
pub const MAX_PAST_DAYS: i64 = 3650;

/// Ordered parse formats, most common first.
const FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%Y-%m-%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap();
    static ref DIGIT_RUN: Regex = Regex::new(r"\d+").unwrap();
}

/// Parse a date string in any supported format.
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return None;
    }

    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
            return Some(date);
        }
    }

    parse_from_digit_groups(date_str)
}

/// Last-resort parse: collect digit runs and infer field order from the
/// position of the 4-digit year token.
fn parse_from_digit_groups(date_str: &str) -> Option<NaiveDate> {
    let runs: Vec<&str> = DIGIT_RUN.find_iter(date_str).map(|m| m.as_str()).collect();
    if runs.len() < 3 {
        return None;
    }

    let year_idx = runs.iter().position(|r| r.len() == 4)?;
    let year: i32 = runs[year_idx].parse().ok()?;

    if year_idx == 0 {
        // YYYY first: YYYY/MM/DD
        let month: u32 = runs[1].parse().ok()?;
        let day: u32 = runs[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    // Year last: try MM/DD then DD/MM
    let first: u32 = runs[0].parse().ok()?;
    let second: u32 = runs[1].parse().ok()?;
    NaiveDate::from_ymd_opt(year, first, second)
        .or_else(|| NaiveDate::from_ymd_opt(year, second, first))
}

/// Render a date in the canonical MM/DD/YYYY output format.
pub fn format_mdy(date: NaiveDate) -> String {
    format!("{:02}/{:02}/{:04}", date.month(), date.day(), date.year())
}

/// Reformat an embedded `YYYY-MM-DD` substring (structured-source form,
/// possibly with a trailing time component) to `MM/DD/YYYY`.
pub fn reformat_iso_substring(value: &str) -> Option<String> {
    let caps = ISO_DATE.captures(value)?;
    Some(format!("{}/{}/{}", &caps[2], &caps[3], &caps[1]))
}

/// Check that a parsed date is plausible for an invoice relative to the
/// given reference date: not more than a year in the future, not more
/// than ten years in the past. Guards against OCR misreads and stray
/// dates in document footers.
pub fn is_plausible(date: NaiveDate, reference: NaiveDate) -> bool {
    let delta = (date - reference).num_days();
    delta <= MAX_FUTURE_DAYS && delta >= -MAX_PAST_DAYS
}
