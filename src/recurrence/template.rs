use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pattern::{date_key, RecurrencePattern};

/// Durable recurrence definition edited by an operator.
///
/// Recurrence fields are kept in their stored shape; `normalize` turns them into a
/// [`RecurrenceConfig`](super::RecurrenceConfig). Records written before the nested
/// `recurrence` object existed carry the flat `recurring*` fields instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTemplate {
    pub id: Uuid,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default = "RecurringTemplate::default_active")]
    pub is_active: bool,
    pub created_at: NaiveDate,
    #[serde(default)]
    pub last_processed: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRecord>,
    #[serde(flatten)]
    pub legacy: LegacyRecurrence,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub daily_adjustments: BTreeMap<String, Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustments_month: Option<String>,
}

impl RecurringTemplate {
    pub fn new(description: impl Into<String>, amount: Decimal, created_at: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount,
            category: None,
            payment_method: None,
            user_id: None,
            is_active: true,
            created_at,
            last_processed: None,
            recurrence: None,
            legacy: LegacyRecurrence::default(),
            daily_adjustments: BTreeMap::new(),
            adjustments_month: None,
        }
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceRecord) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn with_legacy(mut self, legacy: LegacyRecurrence) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn default_active() -> bool {
        true
    }
}

/// Nested recurrence object used by current records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRecord {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub interval: Option<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub pattern_config: Option<PatternConfigRecord>,
}

impl RecurrenceRecord {
    pub fn new(pattern: RecurrencePattern, start_date: NaiveDate) -> Self {
        Self {
            pattern: Some(pattern.as_str().to_string()),
            start_date: Some(start_date),
            ..Self::default()
        }
    }

    pub fn every(mut self, interval: i64) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn ending(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn on_week_days(mut self, days: impl IntoIterator<Item = i64>) -> Self {
        self.pattern_config
            .get_or_insert_with(PatternConfigRecord::default)
            .week_days = Some(days.into_iter().collect());
        self
    }

    pub fn on_month_days(mut self, days: impl IntoIterator<Item = i64>) -> Self {
        self.pattern_config
            .get_or_insert_with(PatternConfigRecord::default)
            .month_days = Some(days.into_iter().collect());
        self
    }

    pub fn on_year_day(mut self, month: i64, day: i64) -> Self {
        self.pattern_config
            .get_or_insert_with(PatternConfigRecord::default)
            .year_config = Some(YearConfigRecord { month, day });
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatternConfigRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_days: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_days: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_config: Option<YearConfigRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearConfigRecord {
    pub month: i64,
    pub day: i64,
}

/// Flat recurrence fields written by the first schema.
///
/// `recurring_days` holds week days for weekly frequencies and month days for monthly ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecurrence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_every: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_end: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_days: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_month: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_day: Option<i64>,
}

impl LegacyRecurrence {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Downstream payment lifecycle, owned outside the scheduler.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

/// Instance payload built from a template before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewInstance {
    pub parent_template_id: Uuid,
    pub occurrence_date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub user_id: Option<String>,
}

impl NewInstance {
    pub fn into_instance(self, id: Uuid) -> ExpenseInstance {
        ExpenseInstance {
            id,
            parent_template_id: self.parent_template_id,
            occurrence_date: self.occurrence_date,
            amount: self.amount,
            description: self.description,
            category: self.category,
            payment_method: self.payment_method,
            user_id: self.user_id,
            payment_status: PaymentStatus::Pending,
        }
    }
}

/// A materialized occurrence of a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInstance {
    pub id: Uuid,
    pub parent_template_id: Uuid,
    pub occurrence_date: NaiveDate,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
}

impl ExpenseInstance {
    pub fn date_key(&self) -> String {
        date_key(self.occurrence_date)
    }
}
