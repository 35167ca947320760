//! Record store abstraction consumed by the scheduler.

pub mod json_backend;
pub mod memory;

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    errors::StoreError,
    recurrence::{ExpenseInstance, NewInstance, RecurringTemplate, YearMonth},
};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence operations the scheduling engine relies on.
///
/// Implementations must keep `update_template_watermark` monotonic: a date earlier than the
/// stored watermark leaves it unchanged. `create_instance` must refuse a second instance for
/// the same template and date with [`StoreError::DuplicateInstance`], checked atomically with
/// the insert.
pub trait RecordStore: Send + Sync {
    fn find_active_templates(&self) -> Result<Vec<RecurringTemplate>>;
    fn find_instance_date_keys(&self, template_id: Uuid) -> Result<HashSet<String>>;
    fn create_instance(&self, payload: NewInstance) -> Result<ExpenseInstance>;
    fn update_template_watermark(&self, template_id: Uuid, date: NaiveDate) -> Result<()>;

    /// Replaces a template's daily adjustments and their month tag.
    fn replace_daily_adjustments(
        &self,
        template_id: Uuid,
        month: YearMonth,
        adjustments: BTreeMap<String, Decimal>,
    ) -> Result<()>;
}

pub use json_backend::JsonRecordStore;
pub use memory::MemoryStore;

/// Shared template mutations so both backends apply them identically.
pub(crate) fn advance_watermark(template: &mut RecurringTemplate, date: NaiveDate) {
    if template.last_processed.map_or(true, |current| date > current) {
        template.last_processed = Some(date);
    }
}

pub(crate) fn ensure_unique(instances: &[ExpenseInstance], payload: &NewInstance) -> Result<()> {
    let taken = instances.iter().any(|instance| {
        instance.parent_template_id == payload.parent_template_id
            && instance.occurrence_date == payload.occurrence_date
    });
    if taken {
        return Err(StoreError::DuplicateInstance {
            template_id: payload.parent_template_id,
            date: payload.occurrence_date,
        });
    }
    Ok(())
}

pub(crate) fn apply_adjustments(
    template: &mut RecurringTemplate,
    month: YearMonth,
    adjustments: BTreeMap<String, Decimal>,
) {
    template.daily_adjustments = adjustments;
    template.adjustments_month = Some(month.to_string());
}
