//! Date-range parsing for temporal expressions like "last week" or
//! "from 2024-01-01 to 2024-01-31".

use chrono::{Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeUnit {
    Days,
    Weeks,
    Months,
    Years,
}

/// Fixed phrase patterns, checked in order. Longer phrases come first so
/// "last 2 weeks" is not swallowed by "last week".
const PHRASE_PATTERNS: &[(&str, RangeUnit, u32)] = &[
    (r"last 2 days|past 2 days", RangeUnit::Days, 2),
    (r"last 3 days|past 3 days", RangeUnit::Days, 3),
    (r"today|last day|past day", RangeUnit::Days, 1),
    (r"last 2 weeks|past 2 weeks", RangeUnit::Weeks, 2),
    (r"this week|last week|past week", RangeUnit::Weeks, 1),
    (r"last 2 months|past 2 months", RangeUnit::Months, 2),
    (
        r"last 3 months|past 3 months|this quarter",
        RangeUnit::Months,
        3,
    ),
    (r"last 6 months|past 6 months|half year", RangeUnit::Months, 6),
    (r"this month|last month|past month", RangeUnit::Months, 1),
    (r"this year|last year|past year", RangeUnit::Years, 1),
    (r"^recent$|^recently$", RangeUnit::Weeks, 1),
];

/// Numbered patterns like "last 5 days" / "past 3 months".
const NUMBER_PATTERNS: &[(&str, RangeUnit)] = &[
    (r"last (\d+) days?|past (\d+) days?", RangeUnit::Days),
    (r"last (\d+) weeks?|past (\d+) weeks?", RangeUnit::Weeks),
    (r"last (\d+) months?|past (\d+) months?", RangeUnit::Months),
    (r"last (\d+) years?|past (\d+) years?", RangeUnit::Years),
];

/// Shortcut keys offered by the CLI menus.
const SHORTCUTS: &[(&str, RangeUnit, u32)] = &[
    ("today", RangeUnit::Days, 1),
    ("3days", RangeUnit::Days, 3),
    ("week", RangeUnit::Weeks, 1),
    ("2weeks", RangeUnit::Weeks, 2),
    ("month", RangeUnit::Months, 1),
];

pub struct TimeParser {
    now: NaiveDateTime,
    phrase_patterns: Vec<(Regex, RangeUnit, u32)>,
    number_patterns: Vec<(Regex, RangeUnit)>,
    date_range_patterns: Vec<Regex>,
}

impl TimeParser {
    pub fn new(now: NaiveDateTime) -> Self {
        let phrase_patterns = PHRASE_PATTERNS
            .iter()
            .map(|(pattern, unit, value)| (compile(pattern), *unit, *value))
            .collect();
        let number_patterns = NUMBER_PATTERNS
            .iter()
            .map(|(pattern, unit)| (compile(pattern), *unit))
            .collect();
        let date_range_patterns = vec![
            compile(r"from\s+(\d{4}[-/]\d{1,2}[-/]\d{1,2})\s+to\s+(\d{4}[-/]\d{1,2}[-/]\d{1,2})"),
            compile(r"(\d{4}[-/]\d{1,2}[-/]\d{1,2})\s*[-~]\s*(\d{4}[-/]\d{1,2}[-/]\d{1,2})"),
        ];

        Self {
            now,
            phrase_patterns,
            number_patterns,
            date_range_patterns,
        }
    }

    pub fn now() -> Self {
        Self::new(chrono::Local::now().naive_local())
    }

    /// Parse a time-range description into a `(start, end)` window.
    /// Unrecognized input defaults to the last day.
    pub fn parse(&self, input: &str) -> (NaiveDateTime, NaiveDateTime) {
        let input = input.trim().to_lowercase();

        if let Some(&(_, unit, value)) = SHORTCUTS.iter().find(|(key, _, _)| *key == input) {
            return self.relative_range(unit, value);
        }

        for (pattern, unit, value) in &self.phrase_patterns {
            if pattern.is_match(&input) {
                return self.relative_range(*unit, *value);
            }
        }

        for (pattern, unit) in &self.number_patterns {
            if let Some(captures) = pattern.captures(&input) {
                let value = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .find_map(|m| m.as_str().parse::<u32>().ok());
                if let Some(value) = value {
                    return self.relative_range(*unit, value);
                }
            }
        }

        if let Some(range) = self.parse_date_range(&input) {
            return range;
        }

        if let Some(date) = parse_date(&input) {
            let start = date.and_time(NaiveTime::MIN);
            return (start, self.now);
        }

        self.relative_range(RangeUnit::Days, 1)
    }

    fn parse_date_range(&self, input: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
        for pattern in &self.date_range_patterns {
            if let Some(captures) = pattern.captures(input) {
                let start = parse_date(captures.get(1)?.as_str())?;
                let end = parse_date(captures.get(2)?.as_str())?;
                // The end date covers its full day
                let end_time = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
                return Some((start.and_time(NaiveTime::MIN), end.and_time(end_time)));
            }
        }
        None
    }

    fn relative_range(&self, unit: RangeUnit, value: u32) -> (NaiveDateTime, NaiveDateTime) {
        let end = self.now;
        let start = match unit {
            RangeUnit::Days => end - Duration::days(value as i64),
            RangeUnit::Weeks => end - Duration::weeks(value as i64),
            RangeUnit::Months => end
                .checked_sub_months(Months::new(value))
                .unwrap_or(end - Duration::days(30 * value as i64)),
            RangeUnit::Years => end
                .checked_sub_months(Months::new(value * 12))
                .unwrap_or(end - Duration::days(365 * value as i64)),
        };
        (start, end)
    }
}

/// Parse a single date in `YYYY-MM-DD` or `YYYY/MM/DD` form.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let normalized = input.trim().replace('/', "-");
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid time pattern")
}
