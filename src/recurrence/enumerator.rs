//! Capped forward walk from a watermark to a process date.

use chrono::NaiveDate;

use super::{calculator::RecurrenceCalculator, normalize::RecurrenceConfig};

/// Upper bound on occurrences produced by one enumeration call.
pub const DEFAULT_MAX_OCCURRENCES_PER_RUN: usize = 100;

/// Result of walking a template forward from its watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceBatch {
    pub dates: Vec<NaiveDate>,
    /// Set when the walk stopped at the cap with occurrences possibly remaining.
    pub capped: bool,
}

impl OccurrenceBatch {
    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

/// Produces the ordered, capped occurrence stream for a template.
#[derive(Debug, Clone, Copy)]
pub struct OccurrenceEnumerator {
    max_occurrences: usize,
}

impl Default for OccurrenceEnumerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OCCURRENCES_PER_RUN)
    }
}

impl OccurrenceEnumerator {
    pub fn new(max_occurrences: usize) -> Self {
        Self { max_occurrences }
    }

    pub fn max_occurrences(&self) -> usize {
        self.max_occurrences
    }

    /// Occurrences strictly after `from_date` and up to `to_inclusive`, ascending.
    pub fn occurrences_until(
        &self,
        config: &RecurrenceConfig,
        from_date: NaiveDate,
        to_inclusive: NaiveDate,
    ) -> OccurrenceBatch {
        let mut batch = OccurrenceBatch::default();
        let mut cursor = from_date;
        while let Some(next) = RecurrenceCalculator::next_occurrence_on_or_after(config, cursor) {
            if next > to_inclusive {
                break;
            }
            if next <= cursor {
                tracing::warn!(%cursor, %next, "recurrence cursor did not advance; stopping");
                break;
            }
            if batch.dates.len() >= self.max_occurrences {
                batch.capped = true;
                break;
            }
            batch.dates.push(next);
            cursor = next;
        }
        batch
    }
}
