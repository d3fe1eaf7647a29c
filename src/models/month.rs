//! Calendar month used to key VRP usage counters
//!
//! VRP monthly caps reset on the first of each calendar month. Months
//! serialize as "YYYY-MM" so they can be used as JSON map keys.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month (e.g., "2026-02")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

impl CalendarMonth {
    /// Create a month; out-of-range months are clamped into 1..=12
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year,
            month: month.clamp(1, 12),
        }
    }

    /// Month containing the given instant
    pub fn of(at: DateTime<Utc>) -> Self {
        Self::new(at.year(), at.month())
    }

    /// The current month (UTC)
    pub fn current() -> Self {
        Self::of(Utc::now())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Get the next month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// Get the previous month
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// Parse a month string in "YYYY-MM" format
    pub fn parse(s: &str) -> Result<Self, MonthParseError> {
        let s = s.trim();
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| MonthParseError::InvalidFormat(s.to_string()))?;

        let year: i32 = year
            .parse()
            .map_err(|_| MonthParseError::InvalidFormat(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| MonthParseError::InvalidFormat(s.to_string()))?;

        if !(1..=12).contains(&month) {
            return Err(MonthParseError::InvalidMonth(month));
        }

        Ok(Self { year, month })
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for CalendarMonth {
    type Error = MonthParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CalendarMonth> for String {
    fn from(month: CalendarMonth) -> Self {
        month.to_string()
    }
}

/// Error type for month parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthParseError {
    InvalidFormat(String),
    InvalidMonth(u32),
}

impl fmt::Display for MonthParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(s) => write!(f, "Invalid month format: {}", s),
            Self::InvalidMonth(m) => write!(f, "Invalid month: {} (must be 1-12)", m),
        }
    }
}

impl std::error::Error for MonthParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_and_display() {
        let month = CalendarMonth::parse("2026-02").unwrap();
        assert_eq!(month.year(), 2026);
        assert_eq!(month.month(), 2);
        assert_eq!(month.to_string(), "2026-02");
        assert_eq!(
            CalendarMonth::parse("2026-13"),
            Err(MonthParseError::InvalidMonth(13))
        );
        assert!(CalendarMonth::parse("February").is_err());
    }

    #[test]
    fn test_navigation_wraps_year() {
        let dec = CalendarMonth::new(2025, 12);
        assert_eq!(dec.next(), CalendarMonth::new(2026, 1));
        assert_eq!(dec.next().prev(), dec);
    }

    #[test]
    fn test_usable_as_json_map_key() {
        let mut usage = BTreeMap::new();
        usage.insert(CalendarMonth::new(2026, 2), 78000i64);
        let json = serde_json::to_string(&usage).unwrap();
        assert_eq!(json, r#"{"2026-02":78000}"#);
        let back: BTreeMap<CalendarMonth, i64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, usage);
    }
}
