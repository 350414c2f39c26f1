//! Date and duration extraction from free text

use crate::intent::cached_regex;
use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use std::sync::OnceLock;

static ISO: OnceLock<Option<Regex>> = OnceLock::new();
static KOREAN: OnceLock<Option<Regex>> = OnceLock::new();
static MONTH_NAME: OnceLock<Option<Regex>> = OnceLock::new();
static SLASH: OnceLock<Option<Regex>> = OnceLock::new();
static NIGHTS_DAYS_KO: OnceLock<Option<Regex>> = OnceLock::new();
static NIGHTS_DAYS_EN: OnceLock<Option<Regex>> = OnceLock::new();
static N_DAYS: OnceLock<Option<Regex>> = OnceLock::new();
static N_DAYS_KO: OnceLock<Option<Regex>> = OnceLock::new();
static WEEK: OnceLock<Option<Regex>> = OnceLock::new();
static DAY_TRIP: OnceLock<Option<Regex>> = OnceLock::new();
static DAY_MARKER: OnceLock<Option<Regex>> = OnceLock::new();

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// A date found in text, with the text that named it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundDate {
    pub text: String,
    pub date: NaiveDate,
}

/// A trip length found in text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundDuration {
    pub text: String,
    pub days: u32,
}

fn num(caps: &Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

/// Month and day without a year: the next occurrence on or after `today`
pub fn next_occurrence(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

fn resolve(year: Option<u32>, month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year as i32, month, day),
        None => next_occurrence(month, day, today),
    }
}

/// First concrete calendar date in `text`
///
/// Accepts `YYYY-MM-DD`, `[YYYY년] M월 D일`, `Month D[, YYYY]` and
/// `M/D[/YYYY]`. Impossible dates (Feb 30) are skipped.
pub fn find_date(text: &str, today: NaiveDate) -> Option<FoundDate> {
    let mut candidates: Vec<(usize, FoundDate)> = Vec::new();
    let mut push = |caps: Captures<'_>, date: Option<NaiveDate>| {
        if let (Some(m), Some(date)) = (caps.get(0), date) {
            candidates.push((
                m.start(),
                FoundDate {
                    text: m.as_str().trim().to_string(),
                    date,
                },
            ));
        }
    };

    if let Some(re) = cached_regex(&ISO, r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b") {
        for caps in re.captures_iter(text) {
            let date = match (num(&caps, 1), num(&caps, 2), num(&caps, 3)) {
                (Some(y), Some(m), Some(d)) => resolve(Some(y), m, d, today),
                _ => None,
            };
            push(caps, date);
        }
    }
    if let Some(re) = cached_regex(&KOREAN, r"(?:(\d{4})년\s*)?(\d{1,2})월\s*(\d{1,2})일") {
        for caps in re.captures_iter(text) {
            let date = match (num(&caps, 2), num(&caps, 3)) {
                (Some(m), Some(d)) => resolve(num(&caps, 1), m, d, today),
                _ => None,
            };
            push(caps, date);
        }
    }
    if let Some(re) = cached_regex(
        &MONTH_NAME,
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s+(\d{4})\b)?",
    ) {
        for caps in re.captures_iter(text) {
            let month = caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .and_then(|m| MONTHS.iter().position(|name| *name == m))
                .map(|i| i as u32 + 1);
            let date = match (month, num(&caps, 2)) {
                (Some(m), Some(d)) => resolve(num(&caps, 3), m, d, today),
                _ => None,
            };
            push(caps, date);
        }
    }
    if let Some(re) = cached_regex(&SLASH, r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}))?\b") {
        for caps in re.captures_iter(text) {
            let date = match (num(&caps, 1), num(&caps, 2)) {
                (Some(m), Some(d)) => resolve(num(&caps, 3), m, d, today),
                _ => None,
            };
            push(caps, date);
        }
    }

    candidates.sort_by_key(|(start, _)| *start);
    candidates.into_iter().next().map(|(_, found)| found)
}

/// Trip length in `text`
///
/// Accepts `N박M일`, `N nights M days`, `N-day`, `N days`, `N일간`,
/// `a week`, `day trip` and `당일치기`.
pub fn find_duration(text: &str) -> Option<FoundDuration> {
    let found = |caps: &Captures<'_>, days: Option<u32>| -> Option<FoundDuration> {
        Some(FoundDuration {
            text: caps.get(0)?.as_str().trim().to_string(),
            days: days.filter(|d| *d > 0)?,
        })
    };

    if let Some(caps) = cached_regex(&NIGHTS_DAYS_KO, r"(\d+)\s*박\s*(\d+)\s*일")
        .and_then(|re| re.captures(text))
    {
        return found(&caps, num(&caps, 2));
    }
    if let Some(caps) = cached_regex(
        &NIGHTS_DAYS_EN,
        r"(?i)\b(\d+)\s*nights?\s*(?:and\s+|,\s*)?(\d+)\s*days?\b",
    )
    .and_then(|re| re.captures(text))
    {
        return found(&caps, num(&caps, 2));
    }
    if let Some(caps) = cached_regex(&N_DAYS, r"(?i)\b(\d+)[\s-]?days?\b").and_then(|re| re.captures(text)) {
        return found(&caps, num(&caps, 1));
    }
    if let Some(caps) =
        cached_regex(&N_DAYS_KO, r"(\d+)\s*일\s*(?:간|동안)").and_then(|re| re.captures(text))
    {
        return found(&caps, num(&caps, 1));
    }
    if let Some(caps) = cached_regex(&WEEK, r"(?i)\b(?:a|one)\s+week\b").and_then(|re| re.captures(text)) {
        return found(&caps, Some(7));
    }
    if let Some(caps) =
        cached_regex(&DAY_TRIP, r"(?i)\bday\s+trip\b|당일치기|일일여행").and_then(|re| re.captures(text))
    {
        return found(&caps, Some(1));
    }
    None
}

/// Highest `Day N` / `N일차` marker in a plan text
pub fn plan_days(text: &str) -> Option<u32> {
    let re = cached_regex(&DAY_MARKER, r"(?i)\bday\s*(\d+)\b|(\d+)\s*일차")?;
    re.captures_iter(text)
        .filter_map(|caps| num(&caps, 1).or_else(|| num(&caps, 2)))
        .filter(|n| *n > 0)
        .max()
}
