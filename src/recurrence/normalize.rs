//! Projects stored recurrence fields, in either schema shape, onto one [`RecurrenceConfig`].

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::errors::ConfigError;

use super::{
    pattern::{PatternConfig, RecurrencePattern, YearConfig},
    template::{LegacyRecurrence, RecurrenceRecord, RecurringTemplate},
};

/// Normalized recurrence rules consumed by the calculator and enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceConfig {
    pub pattern: RecurrencePattern,
    pub interval: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub detail: PatternConfig,
}

impl RecurrenceConfig {
    /// Number of weeks in one matching block for weekly families.
    pub fn week_block(&self) -> i64 {
        match self.pattern {
            RecurrencePattern::Biweekly => 2 * self.interval as i64,
            _ => self.interval as i64,
        }
    }

    pub fn label(&self) -> String {
        let (unit, every) = match self.pattern {
            RecurrencePattern::Daily => ("Day", self.interval),
            RecurrencePattern::Weekly => ("Week", self.interval),
            RecurrencePattern::Biweekly if self.interval == 1 => return "Biweekly".into(),
            RecurrencePattern::Biweekly => ("Week", self.interval * 2),
            RecurrencePattern::Monthly => ("Month", self.interval),
            RecurrencePattern::Yearly => ("Year", self.interval),
        };
        match (every, unit) {
            (1, "Day") => "Daily".into(),
            (1, "Week") => "Weekly".into(),
            (1, "Month") => "Monthly".into(),
            (1, "Year") => "Yearly".into(),
            (n, unit) => format!("Every {} {}s", n, unit),
        }
    }
}

/// Which stored shape a template's recurrence came from.
#[derive(Debug, Clone, Copy)]
pub enum RecurrenceSource<'a> {
    Current(&'a RecurrenceRecord),
    Legacy(&'a LegacyRecurrence),
}

impl<'a> RecurrenceSource<'a> {
    /// The nested `recurrence` object wins when a record carries both shapes.
    pub fn of(template: &'a RecurringTemplate) -> Result<Self, ConfigError> {
        if let Some(record) = template.recurrence.as_ref() {
            return Ok(RecurrenceSource::Current(record));
        }
        if !template.legacy.is_empty() {
            return Ok(RecurrenceSource::Legacy(&template.legacy));
        }
        Err(ConfigError::MissingPattern)
    }
}

/// Shape-independent view of the raw fields, still unvalidated.
#[derive(Debug, Default)]
struct RecurrenceDraft {
    pattern: Option<String>,
    interval: Option<i64>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    week_days: Option<Vec<i64>>,
    month_days: Option<Vec<i64>>,
    year_config: Option<(i64, i64)>,
}

fn parse_current(record: &RecurrenceRecord) -> RecurrenceDraft {
    let config = record.pattern_config.clone().unwrap_or_default();
    RecurrenceDraft {
        pattern: record.pattern.clone(),
        interval: record.interval,
        start_date: record.start_date,
        end_date: record.end_date,
        week_days: config.week_days,
        month_days: config.month_days,
        year_config: config.year_config.map(|year| (year.month, year.day)),
    }
}

fn parse_legacy(legacy: &LegacyRecurrence) -> RecurrenceDraft {
    let mut draft = RecurrenceDraft {
        pattern: legacy.recurring_frequency.clone(),
        interval: legacy.recurring_every,
        start_date: legacy.recurring_start,
        end_date: legacy.recurring_end,
        ..RecurrenceDraft::default()
    };
    let frequency = legacy
        .recurring_frequency
        .as_deref()
        .and_then(RecurrencePattern::parse);
    match frequency {
        Some(RecurrencePattern::Weekly | RecurrencePattern::Biweekly) => {
            draft.week_days = legacy.recurring_days.clone();
        }
        Some(RecurrencePattern::Monthly) => {
            draft.month_days = legacy.recurring_days.clone();
        }
        Some(RecurrencePattern::Yearly) => {
            draft.year_config = legacy.recurring_month.zip(legacy.recurring_day);
        }
        Some(RecurrencePattern::Daily) | None => {}
    }
    draft
}

/// Validates a template's recurrence fields and produces its [`RecurrenceConfig`].
///
/// A missing interval defaults to 1 and a missing start date to the template's creation
/// date.
pub fn normalize(template: &RecurringTemplate) -> Result<RecurrenceConfig, ConfigError> {
    let draft = match RecurrenceSource::of(template)? {
        RecurrenceSource::Current(record) => parse_current(record),
        RecurrenceSource::Legacy(legacy) => parse_legacy(legacy),
    };
    draft.into_config(template.created_at)
}

impl RecurrenceDraft {
    fn into_config(self, created_at: NaiveDate) -> Result<RecurrenceConfig, ConfigError> {
        let raw_pattern = self.pattern.ok_or(ConfigError::MissingPattern)?;
        if raw_pattern.trim().is_empty() {
            return Err(ConfigError::MissingPattern);
        }
        let pattern = RecurrencePattern::parse(&raw_pattern)
            .ok_or_else(|| ConfigError::UnknownPattern(raw_pattern.clone()))?;

        let raw_interval = self.interval.unwrap_or(1);
        let interval = u32::try_from(raw_interval)
            .ok()
            .filter(|value| *value >= 1)
            .ok_or(ConfigError::InvalidInterval(raw_interval))?;

        let start_date = self.start_date.unwrap_or(created_at);
        if let Some(end) = self.end_date {
            if end < start_date {
                return Err(ConfigError::EndBeforeStart {
                    start: start_date,
                    end,
                });
            }
        }

        // Empty arrays are unpopulated blocks, not conflicts.
        let has_week_days = self.week_days.as_ref().is_some_and(|days| !days.is_empty());
        let has_month_days = self.month_days.as_ref().is_some_and(|days| !days.is_empty());
        let has_year = self.year_config.is_some();
        let conflicting = match pattern {
            RecurrencePattern::Daily => has_week_days || has_month_days || has_year,
            RecurrencePattern::Weekly | RecurrencePattern::Biweekly => has_month_days || has_year,
            RecurrencePattern::Monthly => has_week_days || has_year,
            RecurrencePattern::Yearly => has_week_days || has_month_days,
        };
        if conflicting {
            return Err(ConfigError::ConflictingPatternConfig(pattern));
        }

        let detail = match pattern {
            RecurrencePattern::Daily => PatternConfig::Daily,
            RecurrencePattern::Weekly | RecurrencePattern::Biweekly => PatternConfig::Weekly {
                week_days: collect_days(self.week_days, pattern, 0..=6, ConfigError::WeekdayOutOfRange)?,
            },
            RecurrencePattern::Monthly => PatternConfig::Monthly {
                month_days: collect_days(
                    self.month_days,
                    pattern,
                    1..=31,
                    ConfigError::MonthDayOutOfRange,
                )?,
            },
            RecurrencePattern::Yearly => {
                let (month, day) = self
                    .year_config
                    .ok_or(ConfigError::MissingPatternConfig(pattern))?;
                PatternConfig::Yearly(validate_year_config(month, day)?)
            }
        };

        Ok(RecurrenceConfig {
            pattern,
            interval,
            start_date,
            end_date: self.end_date,
            detail,
        })
    }
}

fn collect_days(
    days: Option<Vec<i64>>,
    pattern: RecurrencePattern,
    range: std::ops::RangeInclusive<i64>,
    out_of_range: fn(i64) -> ConfigError,
) -> Result<BTreeSet<u32>, ConfigError> {
    let days = days.unwrap_or_default();
    if days.is_empty() {
        return Err(ConfigError::MissingPatternConfig(pattern));
    }
    days.into_iter()
        .map(|day| {
            if range.contains(&day) {
                Ok(day as u32)
            } else {
                Err(out_of_range(day))
            }
        })
        .collect()
}

/// Accepts any pair that exists in at least one year, so Feb 29 is valid.
fn validate_year_config(month: i64, day: i64) -> Result<YearConfig, ConfigError> {
    let invalid = ConfigError::InvalidYearConfig { month, day };
    let month_u = u32::try_from(month).map_err(|_| invalid.clone())?;
    let day_u = u32::try_from(day).map_err(|_| invalid.clone())?;
    // 2000 is a leap year.
    NaiveDate::from_ymd_opt(2000, month_u, day_u).ok_or(invalid)?;
    Ok(YearConfig {
        month: month_u,
        day: day_u,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::template::RecurrenceRecord;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template_with(record: RecurrenceRecord) -> RecurringTemplate {
        RecurringTemplate::new("Rent", dec!(3000), date(2024, 12, 15)).with_recurrence(record)
    }

    #[test]
    fn current_and_legacy_shapes_normalize_identically() {
        let current = template_with(
            RecurrenceRecord::new(RecurrencePattern::Weekly, date(2025, 1, 6))
                .every(2)
                .on_week_days([1, 5]),
        );
        let legacy = RecurringTemplate::new("Rent", dec!(3000), date(2024, 12, 15)).with_legacy(
            LegacyRecurrence {
                recurring_frequency: Some("Weekly".into()),
                recurring_every: Some(2),
                recurring_start: Some(date(2025, 1, 6)),
                recurring_days: Some(vec![5, 1]),
                ..LegacyRecurrence::default()
            },
        );

        let a = normalize(&current).unwrap();
        let b = normalize(&legacy).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.interval, 2);
        assert_eq!(
            a.detail,
            PatternConfig::Weekly {
                week_days: [1, 5].into_iter().collect()
            }
        );
    }

    #[test]
    fn legacy_yearly_uses_month_and_day_fields() {
        let legacy = RecurringTemplate::new("License", dec!(120), date(2024, 1, 1)).with_legacy(
            LegacyRecurrence {
                recurring_frequency: Some("annually".into()),
                recurring_month: Some(2),
                recurring_day: Some(29),
                ..LegacyRecurrence::default()
            },
        );
        let config = normalize(&legacy).unwrap();
        assert_eq!(config.pattern, RecurrencePattern::Yearly);
        assert_eq!(config.detail, PatternConfig::Yearly(YearConfig { month: 2, day: 29 }));
    }

    #[test]
    fn defaults_interval_and_start_date() {
        let mut record = RecurrenceRecord::new(RecurrencePattern::Daily, date(2025, 1, 1));
        record.start_date = None;
        let config = normalize(&template_with(record)).unwrap();
        assert_eq!(config.interval, 1);
        assert_eq!(config.start_date, date(2024, 12, 15));
        assert_eq!(config.label(), "Daily");
    }

    #[test]
    fn rejects_missing_pattern() {
        let bare = RecurringTemplate::new("Nothing", dec!(1), date(2025, 1, 1));
        assert_eq!(normalize(&bare), Err(ConfigError::MissingPattern));

        let record = RecurrenceRecord {
            start_date: Some(date(2025, 1, 1)),
            ..RecurrenceRecord::default()
        };
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::MissingPattern)
        );
    }

    #[test]
    fn rejects_invalid_interval() {
        let record = RecurrenceRecord::new(RecurrencePattern::Daily, date(2025, 1, 1)).every(0);
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::InvalidInterval(0))
        );
        let record = RecurrenceRecord::new(RecurrencePattern::Daily, date(2025, 1, 1)).every(-3);
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::InvalidInterval(-3))
        );
    }

    #[test]
    fn rejects_empty_pattern_config() {
        let record =
            RecurrenceRecord::new(RecurrencePattern::Weekly, date(2025, 1, 1)).on_week_days(Vec::new());
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::MissingPatternConfig(RecurrencePattern::Weekly))
        );
        let record = RecurrenceRecord::new(RecurrencePattern::Monthly, date(2025, 1, 1));
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::MissingPatternConfig(RecurrencePattern::Monthly))
        );
    }

    #[test]
    fn rejects_out_of_range_days() {
        let record =
            RecurrenceRecord::new(RecurrencePattern::Weekly, date(2025, 1, 1)).on_week_days([7]);
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::WeekdayOutOfRange(7))
        );
        let record =
            RecurrenceRecord::new(RecurrencePattern::Monthly, date(2025, 1, 1)).on_month_days([0]);
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::MonthDayOutOfRange(0))
        );
        let record =
            RecurrenceRecord::new(RecurrencePattern::Yearly, date(2025, 1, 1)).on_year_day(4, 31);
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::InvalidYearConfig { month: 4, day: 31 })
        );
    }

    #[test]
    fn rejects_conflicting_blocks_and_inverted_window() {
        let record = RecurrenceRecord::new(RecurrencePattern::Monthly, date(2025, 1, 1))
            .on_month_days([1])
            .on_week_days([1]);
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::ConflictingPatternConfig(
                RecurrencePattern::Monthly
            ))
        );
        let record = RecurrenceRecord::new(RecurrencePattern::Daily, date(2025, 2, 1))
            .ending(date(2025, 1, 1));
        assert_eq!(
            normalize(&template_with(record)),
            Err(ConfigError::EndBeforeStart {
                start: date(2025, 2, 1),
                end: date(2025, 1, 1)
            })
        );
    }

    #[test]
    fn empty_block_for_another_pattern_is_ignored() {
        let json = serde_json::json!({
            "id": "0b9e4f3a-2c1d-4e5f-8a7b-6c5d4e3f2a10",
            "description": "Rent",
            "amount": "3000",
            "createdAt": "2025-01-01",
            "recurrence": {
                "pattern": "monthly",
                "startDate": "2025-01-01",
                "patternConfig": { "weekDays": [], "monthDays": [1] }
            }
        });
        let template: RecurringTemplate = serde_json::from_value(json).unwrap();
        let config = normalize(&template).unwrap();
        assert_eq!(
            config.detail,
            PatternConfig::Monthly {
                month_days: [1].into_iter().collect()
            }
        );

        let weekly = RecurrenceRecord::new(RecurrencePattern::Weekly, date(2025, 1, 6))
            .on_week_days([1])
            .on_month_days(Vec::new());
        assert!(normalize(&template_with(weekly)).is_ok());
    }

    #[test]
    fn labels_follow_interval() {
        let record = RecurrenceRecord::new(RecurrencePattern::Biweekly, date(2025, 1, 1))
            .every(2)
            .on_week_days([3]);
        assert_eq!(normalize(&template_with(record)).unwrap().label(), "Every 4 Weeks");
        let record = RecurrenceRecord::new(RecurrencePattern::Monthly, date(2025, 1, 1))
            .every(3)
            .on_month_days([1]);
        assert_eq!(normalize(&template_with(record)).unwrap().label(), "Every 3 Months");
    }
}
