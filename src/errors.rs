use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::recurrence::RecurrencePattern;

/// Failures raised while normalizing a template's recurrence fields.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("recurrence pattern is missing")]
    MissingPattern,
    #[error("unknown recurrence pattern `{0}`")]
    UnknownPattern(String),
    #[error("interval must be at least 1, got {0}")]
    InvalidInterval(i64),
    #[error("{0} recurrence requires a non-empty pattern configuration")]
    MissingPatternConfig(RecurrencePattern),
    #[error("{0} recurrence carries configuration blocks for another pattern")]
    ConflictingPatternConfig(RecurrencePattern),
    #[error("week day {0} is outside 0..=6")]
    WeekdayOutOfRange(i64),
    #[error("month day {0} is outside 1..=31")]
    MonthDayOutOfRange(i64),
    #[error("yearly configuration {month}/{day} is not a valid month/day pair")]
    InvalidYearConfig { month: i64, day: i64 },
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// Record store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Template not found: {0}")]
    TemplateNotFound(Uuid),
    /// Another run already stored an instance for this template and date.
    #[error("Instance already exists for template {template_id} on {date}")]
    DuplicateInstance { template_id: Uuid, date: NaiveDate },
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Rejections of operator-supplied daily adjustments.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("month `{0}` must use the YYYY-MM format")]
    InvalidMonthFormat(String),
    #[error("`{0}` is not a valid YYYY-MM-DD date")]
    InvalidDateKey(String),
    #[error("date {date} falls outside month {month}")]
    DateOutsideMonth { date: NaiveDate, month: String },
    #[error("adjustment for {date} must not be negative")]
    NegativeAmount { date: NaiveDate },
}

/// Error surfaced by the manual adjustment API.
#[derive(Debug, Error)]
pub enum AdjustmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure recorded against a single template during a run.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("worker thread panicked while processing the template")]
    WorkerPanicked,
}

/// Errors that abort a whole scheduler run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to load active templates: {0}")]
    TemplateLoad(#[source] StoreError),
}

/// Configuration file failures.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
