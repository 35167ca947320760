use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Recurrence unit of a template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

impl RecurrencePattern {
    /// Parses both the current names and the aliases legacy records used.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Some(Self::Daily),
            "weekly" | "week" => Some(Self::Weekly),
            "biweekly" | "bi-weekly" | "fortnightly" => Some(Self::Biweekly),
            "monthly" | "month" => Some(Self::Monthly),
            "yearly" | "annually" | "year" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Month/day pair for yearly recurrences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearConfig {
    pub month: u32,
    pub day: u32,
}

/// Pattern-specific detail, exactly one variant per pattern family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternConfig {
    Daily,
    /// Days of week, 0 = Sunday.
    Weekly { week_days: BTreeSet<u32> },
    /// Days of month, never clamped to the month's end.
    Monthly { month_days: BTreeSet<u32> },
    Yearly(YearConfig),
}

static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}$").expect("year-month pattern compiles"));

/// A calendar month tag such as `2025-03`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidMonthFormat(raw.to_string());
        if !YEAR_MONTH_RE.is_match(raw) {
            return Err(invalid());
        }
        let year: i32 = raw[..4].parse().map_err(|_| invalid())?;
        let month: u32 = raw[5..].parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }
}

/// Formats a date as its `YYYY-MM-DD` dedup key.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a `YYYY-MM-DD` key back into a date.
pub fn parse_date_key(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_aliases() {
        assert_eq!(
            RecurrencePattern::parse("Bi-Weekly"),
            Some(RecurrencePattern::Biweekly)
        );
        assert_eq!(
            RecurrencePattern::parse("annually"),
            Some(RecurrencePattern::Yearly)
        );
        assert_eq!(RecurrencePattern::parse("hourly"), None);
    }

    #[test]
    fn year_month_requires_strict_format() {
        assert_eq!(
            "2025-03".parse::<YearMonth>(),
            Ok(YearMonth {
                year: 2025,
                month: 3
            })
        );
        assert!("2025-3".parse::<YearMonth>().is_err());
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("25-03-01".parse::<YearMonth>().is_err());
        assert_eq!(YearMonth { year: 2025, month: 3 }.to_string(), "2025-03");
    }
}
