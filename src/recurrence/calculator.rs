//! Pure date and amount rules over a normalized recurrence.

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::AmountPolicy;

use super::{
    normalize::RecurrenceConfig,
    pattern::{date_key, parse_date_key, PatternConfig, YearMonth},
    template::RecurringTemplate,
};

/// Aligned months inspected before a monthly search gives up.
const MONTH_SEARCH_LIMIT: u32 = 96;
/// Aligned years inspected before a yearly search gives up.
const YEAR_SEARCH_LIMIT: u32 = 400;

/// Date matching and amount resolution for recurring templates.
///
/// Date functions never read a template's watermark; amount functions only read the
/// template's base amount and its daily adjustments.
#[derive(Debug, Clone, Default)]
pub struct RecurrenceCalculator {
    policy: AmountPolicy,
}

impl RecurrenceCalculator {
    pub fn new(policy: AmountPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AmountPolicy {
        &self.policy
    }

    /// Returns the earliest matching date strictly after `from_exclusive`, bounded by the
    /// configured end date.
    pub fn next_occurrence_on_or_after(
        config: &RecurrenceConfig,
        from_exclusive: NaiveDate,
    ) -> Option<NaiveDate> {
        let earliest = from_exclusive.succ_opt()?.max(config.start_date);
        if config.end_date.is_some_and(|end| earliest > end) {
            return None;
        }
        let candidate = match &config.detail {
            PatternConfig::Daily => next_daily(config, earliest),
            PatternConfig::Weekly { .. } => next_weekly(config, earliest),
            PatternConfig::Monthly { month_days } => {
                let days: Vec<u32> = month_days.iter().copied().collect();
                next_monthly(config, &days, earliest)
            }
            PatternConfig::Yearly(year) => next_yearly(config, year.month, year.day, earliest),
        }?;
        match config.end_date {
            Some(end) if candidate > end => None,
            _ => Some(candidate),
        }
    }

    /// Predicate form of the pattern rule.
    pub fn should_occur_on_date(config: &RecurrenceConfig, date: NaiveDate) -> bool {
        if date < config.start_date {
            return false;
        }
        if config.end_date.is_some_and(|end| date > end) {
            return false;
        }
        let interval = config.interval as i64;
        match &config.detail {
            PatternConfig::Daily => days_between(config.start_date, date) % interval == 0,
            PatternConfig::Weekly { week_days } => {
                week_days.contains(&date.weekday().num_days_from_sunday())
                    && (days_between(config.start_date, date) / 7) % config.week_block() == 0
            }
            PatternConfig::Monthly { month_days } => {
                month_days.contains(&date.day())
                    && months_between(config.start_date, date) % interval == 0
            }
            PatternConfig::Yearly(year) => {
                date.month() == year.month
                    && date.day() == year.day
                    && (date.year() - config.start_date.year()) as i64 % interval == 0
            }
        }
    }

    /// Every matching date in `[start, end]`, ascending.
    pub fn occurrences_in_range(
        config: &RecurrenceConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        if end < start {
            return dates;
        }
        if Self::should_occur_on_date(config, start) {
            dates.push(start);
        }
        let mut cursor = start;
        while let Some(next) = Self::next_occurrence_on_or_after(config, cursor) {
            if next > end || next <= cursor {
                break;
            }
            dates.push(next);
            cursor = next;
        }
        dates
    }

    /// Monthly total for the template's pattern, rounded to cents.
    pub fn monthly_amount(&self, template: &RecurringTemplate, config: &RecurrenceConfig) -> Decimal {
        round_cents(self.raw_monthly_amount(template.amount, config))
    }

    /// The template amount expressed as a daily rate, rounded to cents.
    pub fn base_daily_amount(
        &self,
        template: &RecurringTemplate,
        config: &RecurrenceConfig,
    ) -> Decimal {
        let monthly = self.raw_monthly_amount(template.amount, config);
        round_cents(
            monthly
                .checked_div(self.policy.days_per_month)
                .unwrap_or(Decimal::ZERO),
        )
    }

    /// Override for `date_str` when the adjustments map is tagged with that date's month,
    /// otherwise the base amount. Unparseable dates resolve to the base amount.
    pub fn daily_adjusted_amount(template: &RecurringTemplate, date_str: &str) -> Decimal {
        match parse_date_key(date_str) {
            Some(date) => Self::daily_adjusted_amount_on(template, date),
            None => template.amount,
        }
    }

    pub fn daily_adjusted_amount_on(template: &RecurringTemplate, date: NaiveDate) -> Decimal {
        let tagged_month = template
            .adjustments_month
            .as_deref()
            .and_then(|raw| raw.parse::<YearMonth>().ok());
        match tagged_month {
            Some(month) if month.contains(date) => template
                .daily_adjustments
                .get(&date_key(date))
                .copied()
                .unwrap_or(template.amount),
            _ => template.amount,
        }
    }

    /// Sum of adjusted amounts over every occurrence in `[start, end]`.
    pub fn range_amount(
        template: &RecurringTemplate,
        config: &RecurrenceConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Decimal {
        Self::occurrences_in_range(config, start, end)
            .into_iter()
            .map(|date| Self::daily_adjusted_amount_on(template, date))
            .sum()
    }

    fn raw_monthly_amount(&self, amount: Decimal, config: &RecurrenceConfig) -> Decimal {
        let interval = Decimal::from(config.interval);
        let scaled = match &config.detail {
            PatternConfig::Daily => amount * self.policy.days_per_month,
            PatternConfig::Weekly { week_days } => {
                let per_week = amount * Decimal::from(week_days.len() as u64);
                let block = Decimal::from(config.week_block());
                return (per_week * self.policy.weeks_per_month)
                    .checked_div(block)
                    .unwrap_or(Decimal::ZERO);
            }
            PatternConfig::Monthly { month_days } => amount * Decimal::from(month_days.len() as u64),
            PatternConfig::Yearly(_) => amount / Decimal::from(12),
        };
        scaled.checked_div(interval).unwrap_or(Decimal::ZERO)
    }
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    month_index(to) - month_index(from)
}

/// Smallest multiple of `step` that is `>= offset`, for non-negative offsets.
fn ceil_to_step(offset: i64, step: i64) -> i64 {
    (offset + step - 1) / step * step
}

fn next_daily(config: &RecurrenceConfig, earliest: NaiveDate) -> Option<NaiveDate> {
    let offset = days_between(config.start_date, earliest);
    let steps = ceil_to_step(offset, config.interval as i64);
    config
        .start_date
        .checked_add_days(Days::new(u64::try_from(steps).ok()?))
}

fn next_weekly(config: &RecurrenceConfig, earliest: NaiveDate) -> Option<NaiveDate> {
    // One full block plus one week always contains a matching weekday.
    let limit = config.week_block() * 7 + 7;
    let mut day = earliest;
    for _ in 0..limit {
        if config.end_date.is_some_and(|end| day > end) {
            return None;
        }
        if RecurrenceCalculator::should_occur_on_date(config, day) {
            return Some(day);
        }
        day = day.succ_opt()?;
    }
    None
}

fn next_monthly(config: &RecurrenceConfig, days: &[u32], earliest: NaiveDate) -> Option<NaiveDate> {
    let interval = config.interval as i64;
    let start_idx = month_index(config.start_date);
    let first_aligned = start_idx + ceil_to_step(months_between(config.start_date, earliest), interval);
    for step in 0..MONTH_SEARCH_LIMIT as i64 {
        let idx = first_aligned + step * interval;
        let year = i32::try_from(idx.div_euclid(12)).ok()?;
        let month = idx.rem_euclid(12) as u32 + 1;
        // Days past the month's end skip the month instead of clamping.
        let found = days
            .iter()
            .filter_map(|day| NaiveDate::from_ymd_opt(year, month, *day))
            .find(|date| *date >= earliest);
        if found.is_some() {
            return found;
        }
        if config
            .end_date
            .is_some_and(|end| NaiveDate::from_ymd_opt(year, month, 1).map_or(true, |first| first > end))
        {
            return None;
        }
    }
    None
}

fn next_yearly(
    config: &RecurrenceConfig,
    month: u32,
    day: u32,
    earliest: NaiveDate,
) -> Option<NaiveDate> {
    let interval = config.interval as i64;
    let start_year = config.start_date.year() as i64;
    let mut year = start_year + ceil_to_step(earliest.year() as i64 - start_year, interval);
    for _ in 0..YEAR_SEARCH_LIMIT {
        let candidate_year = i32::try_from(year).ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(candidate_year, month, day) {
            if date >= earliest {
                return Some(date);
            }
        }
        if config.end_date.is_some_and(|end| candidate_year > end.year()) {
            return None;
        }
        year += interval;
    }
    None
}
