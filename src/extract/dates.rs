//! Tolerant date parsing for dates lifted out of message text.
//!
//! Accepts `08/22/2015`, `2015-08-22`, `December 21, 2020`,
//! `Monday, December 21` (year inferred from `today`), and delivery windows
//! such as `Monday, December 21 - Wednesday, December 23`.

use std::sync::LazyLock;

use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;

use crate::task::Scheduled;

static ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("valid regex"));

static RANGE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+-\s+|\s*[–—]\s*").expect("valid regex"));

const WEEKDAYS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "mon", "tue",
    "tues", "wed", "thu", "thur", "thurs", "fri", "sat", "sun",
];

const WORDY_FORMATS: &[&str] = &["%B %d %Y", "%b %d %Y", "%d %B %Y", "%d %b %Y"];

/// A year-less date this far behind `today` is taken to be next year's.
const STALE_AFTER_DAYS: i64 = 90;

fn clean(text: &str) -> Vec<String> {
    let without_ordinals = ORDINAL.replace_all(text, "$1");
    without_ordinals
        .replace([',', '.'], " ")
        .split_whitespace()
        .filter(|tok| !WEEKDAYS.contains(&tok.to_lowercase().as_str()))
        .map(str::to_string)
        .collect()
}

/// `08/22/2015`, `08/22/15` or `2015-08-22`. Two-digit years are only
/// accepted in the slash form.
fn parse_numeric(token: &str) -> Option<NaiveDate> {
    let fmt = match token.rsplit_once('/') {
        Some((_, year)) if year.len() == 2 => "%m/%d/%y",
        Some((_, year)) if year.len() == 4 => "%m/%d/%Y",
        Some(_) => return None,
        None if token.split('-').next().is_some_and(|year| year.len() == 4) => "%Y-%m-%d",
        None => return None,
    };
    NaiveDate::parse_from_str(token, fmt).ok()
}

fn parse_wordy(candidate: &str) -> Option<NaiveDate> {
    WORDY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
}

/// A parsed date and whether its year was filled in from `year`.
fn parse_parts(text: &str, year: i32) -> Option<(NaiveDate, bool)> {
    let tokens = clean(text);
    let first = tokens.first()?;

    if let Some(date) = parse_numeric(first) {
        return Some((date, false));
    }
    if tokens.len() >= 3
        && let Some(date) = parse_wordy(&tokens[..3].join(" "))
    {
        return Some((date, false));
    }
    if tokens.len() >= 2 {
        let candidate = format!("{} {year}", tokens[..2].join(" "));
        return parse_wordy(&candidate).map(|date| (date, true));
    }
    None
}

fn next_year(date: NaiveDate) -> NaiveDate {
    date.with_year(date.year() + 1).unwrap_or(date)
}

/// Parse a single date, or `None` when nothing recognisable is found.
///
/// A missing year is today's, unless that puts the date more than
/// `STALE_AFTER_DAYS` in the past, in which case it is next year's.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (date, inferred) = parse_parts(text, today.year())?;
    if inferred && (today - date).num_days() > STALE_AFTER_DAYS {
        return Some(next_year(date));
    }
    Some(date)
}

/// Parse the far side of a window. A missing year or month is taken
/// from `start`, rolling forward so the end never lands before it.
fn parse_end(text: &str, start: NaiveDate) -> Option<NaiveDate> {
    if let Some((end, inferred)) = parse_parts(text, start.year()) {
        if inferred && end < start {
            return Some(next_year(end));
        }
        return Some(end);
    }

    // "December 21 - 23"
    let day = text.trim().parse::<u32>().ok()?;
    match start.with_day(day) {
        Some(end) if end >= start => Some(end),
        _ => start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.with_day(day)),
    }
}

/// Parse a day or a two-sided window into a schedule.
pub fn parse_schedule(text: &str, today: NaiveDate) -> Option<Scheduled> {
    let sides: Vec<&str> = RANGE_SEPARATOR.splitn(text.trim(), 2).collect();
    if let [start, end] = sides.as_slice()
        && let Some(start) = parse_date(start, today)
    {
        return Some(match parse_end(end, start) {
            Some(end) if end > start => Scheduled::Between(start, end),
            _ => Scheduled::On(start),
        });
    }
    parse_date(text, today).map(Scheduled::On)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2020, 12, 1)
    }

    #[test]
    fn numeric_formats() {
        assert_eq!(parse_date("08/22/2015", today()), Some(date(2015, 8, 22)));
        assert_eq!(parse_date("2015-08-22", today()), Some(date(2015, 8, 22)));
    }

    #[test]
    fn two_digit_year() {
        assert_eq!(parse_date("12/21/20", today()), Some(date(2020, 12, 21)));
        assert_eq!(parse_date("01/04/21", today()), Some(date(2021, 1, 4)));
        assert_eq!(parse_date("20-12-21", today()), None);
    }

    #[test]
    fn long_form_with_year() {
        assert_eq!(parse_date("December 21, 2020", today()), Some(date(2020, 12, 21)));
        assert_eq!(parse_date("Dec 21 2020", today()), Some(date(2020, 12, 21)));
        assert_eq!(parse_date("21 December 2020", today()), Some(date(2020, 12, 21)));
    }

    #[test]
    fn weekday_and_ordinal_are_ignored() {
        assert_eq!(
            parse_date("Monday, December 21st, 2020", today()),
            Some(date(2020, 12, 21))
        );
    }

    #[test]
    fn missing_year_uses_today() {
        assert_eq!(parse_date("Monday, December 21", today()), Some(date(2020, 12, 21)));
        assert_eq!(parse_date("November 20", today()), Some(date(2020, 11, 20)));
    }

    #[test]
    fn missing_year_rolls_into_next_year() {
        let today = date(2020, 12, 28);
        assert_eq!(parse_date("Monday, January 4", today), Some(date(2021, 1, 4)));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_date("soon", today()), None);
        assert_eq!(parse_date("", today()), None);
    }

    #[test]
    fn schedule_single_day() {
        assert_eq!(
            parse_schedule("December 21, 2020", today()),
            Some(Scheduled::On(date(2020, 12, 21)))
        );
    }

    #[test]
    fn schedule_window() {
        assert_eq!(
            parse_schedule("Monday, December 21 - Wednesday, December 23", today()),
            Some(Scheduled::Between(date(2020, 12, 21), date(2020, 12, 23)))
        );
        assert_eq!(
            parse_schedule("December 21 – 23", today()),
            Some(Scheduled::Between(date(2020, 12, 21), date(2020, 12, 23)))
        );
    }

    #[test]
    fn schedule_window_across_new_year() {
        assert_eq!(
            parse_schedule("December 30 - January 2", today()),
            Some(Scheduled::Between(date(2020, 12, 30), date(2021, 1, 2)))
        );
        assert_eq!(
            parse_schedule("December 30 – 2", today()),
            Some(Scheduled::Between(date(2020, 12, 30), date(2021, 1, 2)))
        );
    }

    #[test]
    fn schedule_window_with_bad_end_collapses_to_start() {
        assert_eq!(
            parse_schedule("December 21 - whenever", today()),
            Some(Scheduled::On(date(2020, 12, 21)))
        );
    }
}
