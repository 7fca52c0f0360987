//! Date resolution for free-text phrases.
//!
//! Best effort: a small set of absolute formats ("March 3", "3 Mar 2027",
//! ISO, slash dates) plus the relative phrases people actually type at the
//! bot ("tomorrow", "next friday", "in 3 weeks"). Year-less phrases default
//! to the current year and may roll over to the next (see [`resolve`]).

use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("Can't parse date {0}")]
    Unparseable(String),
    #[error("Deadline already passed")]
    AlreadyPassed,
}

/// Render a date the way the bot speaks about dates: `Mar 03, 2027`.
pub fn long_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

/// Resolve a date phrase against `today`.
///
/// A parsed date earlier than `today` is re-interpreted in the following
/// year when `strict` is false and its year equals the current year ("Dec 1"
/// typed in late December means next December). Strict mode disables the
/// rollover guess and is used for abstract and notification dates.
pub fn resolve(text: &str, today: NaiveDate, strict: bool) -> Result<NaiveDate, DateError> {
    let parsed =
        parse_phrase(text, today).ok_or_else(|| DateError::Unparseable(text.trim().to_string()))?;

    if parsed >= today {
        return Ok(parsed);
    }

    if !strict && parsed.year() == today.year() {
        // Feb 29 has no counterpart in the following year; stays rejected.
        return parsed.with_year(parsed.year() + 1).ok_or(DateError::AlreadyPassed);
    }

    Err(DateError::AlreadyPassed)
}

/// Parse a phrase into a calendar date without any passed/rollover policy.
pub fn parse_phrase(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = normalize(text);
    if cleaned.is_empty() {
        return None;
    }

    parse_relative(&cleaned, today).or_else(|| parse_absolute(&cleaned, today.year()))
}

fn normalize(text: &str) -> String {
    let lowered = text.to_ascii_lowercase();
    let mut tokens: Vec<String> = lowered
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(strip_ordinal)
        .collect();

    // Leading prepositions survive sloppy phrasing ("on March 3"). "in" is
    // left alone so "in 3 days" still reads as relative.
    if matches!(tokens.first().map(String::as_str), Some("on" | "by" | "at")) {
        tokens.remove(0);
    }
    tokens.retain(|token| token != "the" && token != "of");

    tokens.join(" ")
}

/// "3rd" -> "3". Tokens that are not digits-plus-suffix pass through.
fn strip_ordinal(token: &str) -> String {
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(digits) = token.strip_suffix(suffix) {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return digits.to_string();
            }
        }
    }
    token.to_string()
}

fn parse_relative(cleaned: &str, today: NaiveDate) -> Option<NaiveDate> {
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let tokens = if tokens.first() == Some(&"in") { &tokens[1..] } else { &tokens[..] };

    match tokens {
        ["today"] => Some(today),
        ["tomorrow"] => today.succ_opt(),
        ["next", "week"] => today.checked_add_signed(Duration::days(7)),
        ["next", "month"] => today.checked_add_months(Months::new(1)),
        [count, "day" | "days"] => {
            let days = count.parse::<i64>().ok()?;
            today.checked_add_signed(Duration::days(days))
        }
        [count, "week" | "weeks"] => {
            let weeks = count.parse::<i64>().ok()?;
            today.checked_add_signed(Duration::days(weeks * 7))
        }
        ["next", day] | [day] => {
            let weekday = Weekday::from_str(day).ok()?;
            Some(next_weekday(today, weekday))
        }
        _ => None,
    }
}

/// Next occurrence strictly after `today`; a bare "friday" on a Friday means
/// a week out, not the same day.
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let ahead = (target - current - 1).rem_euclid(7) + 1;
    today + Duration::days(ahead)
}

fn parse_absolute(cleaned: &str, default_year: i32) -> Option<NaiveDate> {
    // %B accepts both full and abbreviated month names when parsing.
    const WITH_YEAR: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d %Y", "%d %B %Y"];
    for format in WITH_YEAR {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, format) {
            return Some(date);
        }
    }

    let defaulted = format!("{cleaned} {default_year}");
    for format in ["%B %d %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&defaulted, format) {
            return Some(date);
        }
    }

    NaiveDate::parse_from_str(&format!("{cleaned}/{default_year}"), "%m/%d/%Y").ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{long_date, parse_phrase, resolve, DateError};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn absolute_phrases_parse_with_and_without_year() {
        let today = date(2026, 10, 5);
        assert_eq!(parse_phrase("March 3, 2027", today), Some(date(2027, 3, 3)));
        assert_eq!(parse_phrase("3 Mar 2027", today), Some(date(2027, 3, 3)));
        assert_eq!(parse_phrase("2027-03-03", today), Some(date(2027, 3, 3)));
        assert_eq!(parse_phrase("12/1", today), Some(date(2026, 12, 1)));
        assert_eq!(parse_phrase("Dec 1", today), Some(date(2026, 12, 1)));
        assert_eq!(parse_phrase("on December 1st", today), Some(date(2026, 12, 1)));
    }

    #[test]
    fn relative_phrases_resolve_against_today() {
        let today = date(2026, 10, 5); // a Monday
        assert_eq!(parse_phrase("today", today), Some(today));
        assert_eq!(parse_phrase("tomorrow", today), Some(date(2026, 10, 6)));
        assert_eq!(parse_phrase("in 3 days", today), Some(date(2026, 10, 8)));
        assert_eq!(parse_phrase("2 weeks", today), Some(date(2026, 10, 19)));
        assert_eq!(parse_phrase("next week", today), Some(date(2026, 10, 12)));
        assert_eq!(parse_phrase("next month", today), Some(date(2026, 11, 5)));
        assert_eq!(parse_phrase("friday", today), Some(date(2026, 10, 9)));
        assert_eq!(parse_phrase("next monday", today), Some(date(2026, 10, 12)));
    }

    #[test]
    fn garbage_is_unparseable() {
        let today = date(2026, 10, 5);
        assert_eq!(parse_phrase("whenever", today), None);
        assert_eq!(
            resolve("whenever", today, false),
            Err(DateError::Unparseable("whenever".to_string()))
        );
    }

    #[test]
    fn december_typed_in_october_stays_in_the_current_year() {
        let today = date(2026, 10, 5);
        assert_eq!(resolve("Dec 1", today, false), Ok(date(2026, 12, 1)));
    }

    #[test]
    fn passed_date_in_current_year_rolls_over_when_lenient() {
        let today = date(2026, 1, 5);
        assert_eq!(resolve("Jan 2", today, false), Ok(date(2027, 1, 2)));
    }

    #[test]
    fn passed_date_is_rejected_in_strict_mode_regardless_of_proximity() {
        let today = date(2026, 1, 5);
        assert_eq!(resolve("Jan 2", today, true), Err(DateError::AlreadyPassed));
    }

    #[test]
    fn explicit_past_year_is_rejected_even_when_lenient() {
        let today = date(2026, 10, 5);
        assert_eq!(resolve("March 3, 2024", today, false), Err(DateError::AlreadyPassed));
    }

    #[test]
    fn long_date_renders_in_bot_style() {
        assert_eq!(long_date(date(2027, 3, 3)), "Mar 03, 2027");
    }
}
