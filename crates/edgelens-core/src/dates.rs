//! Normalization of free-form publication dates to `YYYY-MM-DD`

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_CANONICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("invalid canonical date regex")
});

// "10 December 2024", "10-Dec-2024"
static RE_DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})[\s,-]+([a-z]+)[\s,-]+(\d{4})$").expect("invalid date regex")
});

// "December 10, 2024", "dec-10-2024"
static RE_MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z]+)[\s,-]+(\d{1,2})[\s,-]+(\d{4})$").expect("invalid date regex")
});

// "10/12/2024", "10-12-2024", "10 12 2024"
static RE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[/\- ](\d{1,2})[/\- ](\d{4})$").expect("invalid date regex")
});

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Zero-based month index for a full or three-letter English month name
fn month_index(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|month| *month == name || (name.len() == 3 && month.starts_with(&name)))
        .map(|i| i as u32)
}

/// Build a date from a zero-based month, rejecting anything the calendar doesn't have.
fn calendar_date(year: i32, month0: u32, day: u32) -> Option<NaiveDate> {
    if month0 > 11 || !(1..=31).contains(&day) || !(1900..=2100).contains(&year) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month0 + 1, day)?;
    (date.year() == year && date.month0() == month0 && date.day() == day).then_some(date)
}

fn parse_textual(input: &str) -> Option<NaiveDate> {
    if let Some(caps) = RE_DAY_MONTH_YEAR.captures(input) {
        let day = caps[1].parse().ok()?;
        let month = month_index(&caps[2])?;
        let year = caps[3].parse().ok()?;
        return calendar_date(year, month, day);
    }
    if let Some(caps) = RE_MONTH_DAY_YEAR.captures(input) {
        let month = month_index(&caps[1])?;
        let day = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        return calendar_date(year, month, day);
    }
    None
}

/// Already `YYYY-MM-DD`; still has to name a real day
fn parse_canonical(input: &str) -> Option<NaiveDate> {
    let caps = RE_CANONICAL.captures(input)?;
    let year = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    calendar_date(year, month.checked_sub(1)?, day)
}

/// Day-first, so `03/04/2024` is the 3rd of April
fn parse_numeric(input: &str) -> Option<NaiveDate> {
    let caps = RE_NUMERIC.captures(input)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    calendar_date(year, month.checked_sub(1)?, day)
}

/// Convert a human-entered date into ISO 8601 (`YYYY-MM-DD`).
///
/// Returns `None` for anything that can't be read as a real calendar date
/// between 1900 and 2100. Valid input that is already `YYYY-MM-DD` is returned as is.
pub fn format_iso8601_date(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if RE_CANONICAL.is_match(input) {
        return parse_canonical(input).map(|_| input.to_string());
    }

    parse_textual(input)
        .or_else(|| parse_numeric(input))
        .map(|date| date.format("%Y-%m-%d").to_string())
}
