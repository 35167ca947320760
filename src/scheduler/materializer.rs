//! One occurrence date in, at most one stored instance out.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::{
    errors::StoreError,
    recurrence::{date_key, ExpenseInstance, NewInstance, RecurrenceCalculator, RecurringTemplate},
    store::RecordStore,
};

/// Outcome of materializing one occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Materialization {
    Created(ExpenseInstance),
    /// Dry run: the payload that would have been stored.
    Preview(NewInstance),
    /// An instance already exists for this template and date.
    Skipped,
}

/// Turns occurrence dates into stored instances, at most one per template and date.
pub struct InstanceMaterializer;

impl InstanceMaterializer {
    /// Builds the instance payload for `date`; descriptive fields are copied from the template.
    pub fn build_payload(template: &RecurringTemplate, date: NaiveDate) -> NewInstance {
        NewInstance {
            parent_template_id: template.id,
            occurrence_date: date,
            amount: RecurrenceCalculator::daily_adjusted_amount_on(template, date),
            description: template.description.clone(),
            category: template.category.clone(),
            payment_method: template.payment_method.clone(),
            user_id: template.user_id.clone(),
        }
    }

    /// Creates the instance for `date` unless its key is already in `existing_date_keys`.
    ///
    /// Created keys are added to `existing_date_keys`. A store that already holds the date,
    /// because an overlapping run created it after the keys were read, also yields `Skipped`.
    /// Dry runs never touch the store.
    pub fn materialize(
        store: &dyn RecordStore,
        template: &RecurringTemplate,
        date: NaiveDate,
        existing_date_keys: &mut HashSet<String>,
        dry_run: bool,
    ) -> Result<Materialization, StoreError> {
        let key = date_key(date);
        if existing_date_keys.contains(&key) {
            return Ok(Materialization::Skipped);
        }
        let payload = Self::build_payload(template, date);
        if dry_run {
            existing_date_keys.insert(key);
            return Ok(Materialization::Preview(payload));
        }
        match store.create_instance(payload) {
            Ok(instance) => {
                existing_date_keys.insert(key);
                Ok(Materialization::Created(instance))
            }
            Err(StoreError::DuplicateInstance { .. }) => {
                tracing::debug!(
                    template = %template.id,
                    %date,
                    "instance already stored by a concurrent run"
                );
                existing_date_keys.insert(key);
                Ok(Materialization::Skipped)
            }
            Err(err) => Err(err),
        }
    }
}
