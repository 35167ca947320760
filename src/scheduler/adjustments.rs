//! Operator overrides of single-day amounts.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    errors::{AdjustmentError, ValidationError},
    recurrence::{date_key, parse_date_key, YearMonth},
    store::RecordStore,
};

/// Manual per-day amount overrides for a single month.
pub struct AdjustmentService;

impl AdjustmentService {
    /// Replaces the template's adjustments with `entries`, tagged with `year_month`.
    ///
    /// Every key must be a date inside `year_month` and every amount non-negative. Keys are
    /// stored in canonical `YYYY-MM-DD` form. Nothing is written when validation fails.
    pub fn set_daily_adjustments(
        store: &dyn RecordStore,
        template_id: Uuid,
        year_month: &str,
        entries: BTreeMap<String, Decimal>,
    ) -> Result<(), AdjustmentError> {
        let month: YearMonth = year_month.parse()?;
        let adjustments = Self::validate(month, entries)?;
        store.replace_daily_adjustments(template_id, month, adjustments)?;
        tracing::info!(template = %template_id, %month, "daily adjustments replaced");
        Ok(())
    }

    fn validate(
        month: YearMonth,
        entries: BTreeMap<String, Decimal>,
    ) -> Result<BTreeMap<String, Decimal>, ValidationError> {
        let mut normalized = BTreeMap::new();
        for (raw, amount) in entries {
            let date =
                parse_date_key(&raw).ok_or_else(|| ValidationError::InvalidDateKey(raw.clone()))?;
            if !month.contains(date) {
                return Err(ValidationError::DateOutsideMonth {
                    date,
                    month: month.to_string(),
                });
            }
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(ValidationError::NegativeAmount { date });
            }
            normalized.insert(date_key(date), amount);
        }
        Ok(normalized)
    }
}
