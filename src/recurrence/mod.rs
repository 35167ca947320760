//! Recurrence models, normalization, and the pure occurrence rules.

pub mod calculator;
pub mod enumerator;
pub mod normalize;
pub mod pattern;
pub mod template;

pub use calculator::RecurrenceCalculator;
pub use enumerator::{OccurrenceBatch, OccurrenceEnumerator, DEFAULT_MAX_OCCURRENCES_PER_RUN};
pub use normalize::{normalize, RecurrenceConfig, RecurrenceSource};
pub use pattern::{date_key, parse_date_key, PatternConfig, RecurrencePattern, YearConfig, YearMonth};
pub use template::{
    ExpenseInstance, LegacyRecurrence, NewInstance, PatternConfigRecord, PaymentStatus,
    RecurrenceRecord, RecurringTemplate, YearConfigRecord,
};
