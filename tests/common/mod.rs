#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier, Mutex,
    },
};

use chrono::NaiveDate;
use expense_core::{
    errors::StoreError,
    recurrence::{ExpenseInstance, NewInstance, RecurrenceRecord, RecurringTemplate, YearMonth},
    store::{MemoryStore, RecordStore},
    time::FixedClock,
    ExpenseScheduler, RecurrencePattern, SchedulerConfig,
};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn temp_base() -> std::path::PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn template(
    description: &str,
    amount: Decimal,
    recurrence: RecurrenceRecord,
) -> RecurringTemplate {
    let created = recurrence.start_date.unwrap_or_else(|| date(2025, 1, 1));
    RecurringTemplate::new(description, amount, created).with_recurrence(recurrence)
}

pub fn daily_from(start: NaiveDate) -> RecurrenceRecord {
    RecurrenceRecord::new(RecurrencePattern::Daily, start)
}

/// Scheduler over `store` with the clock pinned to `today`.
pub fn scheduler(store: Arc<dyn RecordStore>, today: NaiveDate) -> ExpenseScheduler {
    scheduler_with(store, today, &SchedulerConfig::default())
}

pub fn scheduler_with(
    store: Arc<dyn RecordStore>,
    today: NaiveDate,
    config: &SchedulerConfig,
) -> ExpenseScheduler {
    ExpenseScheduler::new(store, config).with_clock(Arc::new(FixedClock(today)))
}

pub fn occurrence_dates(instances: &[ExpenseInstance]) -> Vec<NaiveDate> {
    let mut dates: Vec<_> = instances.iter().map(|i| i.occurrence_date).collect();
    dates.sort();
    dates
}

/// Wraps a [`MemoryStore`] and injects failures into chosen operations.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    /// Fail the create call with this 1-based index (counted across all templates).
    pub fail_create_at: Option<usize>,
    pub fail_template_load: bool,
    pub fail_watermark: bool,
    creates: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn failing_create_at(mut self, call: usize) -> Self {
        self.fail_create_at = Some(call);
        self
    }

    pub fn failing_template_load(mut self) -> Self {
        self.fail_template_load = true;
        self
    }

    pub fn failing_watermark(mut self) -> Self {
        self.fail_watermark = true;
        self
    }
}

impl RecordStore for FlakyStore {
    fn find_active_templates(&self) -> Result<Vec<RecurringTemplate>, StoreError> {
        if self.fail_template_load {
            return Err(StoreError::Backend("templates unavailable".into()));
        }
        self.inner.find_active_templates()
    }

    fn find_instance_date_keys(&self, template_id: Uuid) -> Result<HashSet<String>, StoreError> {
        self.inner.find_instance_date_keys(template_id)
    }

    fn create_instance(&self, payload: NewInstance) -> Result<ExpenseInstance, StoreError> {
        let call = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create_at == Some(call) {
            return Err(StoreError::Backend(format!("create #{call} rejected")));
        }
        self.inner.create_instance(payload)
    }

    fn update_template_watermark(&self, template_id: Uuid, date: NaiveDate) -> Result<(), StoreError> {
        if self.fail_watermark {
            return Err(StoreError::Backend("watermark write rejected".into()));
        }
        self.inner.update_template_watermark(template_id, date)
    }

    fn replace_daily_adjustments(
        &self,
        template_id: Uuid,
        month: YearMonth,
        adjustments: BTreeMap<String, Decimal>,
    ) -> Result<(), StoreError> {
        self.inner
            .replace_daily_adjustments(template_id, month, adjustments)
    }
}

/// Holds every caller of `find_instance_date_keys` until `parties` runs have read their
/// keys, so overlapping runs all see the same stale set.
pub struct OverlappingReadsStore {
    pub inner: MemoryStore,
    barrier: Barrier,
}

impl OverlappingReadsStore {
    pub fn new(inner: MemoryStore, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

impl RecordStore for OverlappingReadsStore {
    fn find_active_templates(&self) -> Result<Vec<RecurringTemplate>, StoreError> {
        self.inner.find_active_templates()
    }

    fn find_instance_date_keys(&self, template_id: Uuid) -> Result<HashSet<String>, StoreError> {
        let keys = self.inner.find_instance_date_keys(template_id);
        self.barrier.wait();
        keys
    }

    fn create_instance(&self, payload: NewInstance) -> Result<ExpenseInstance, StoreError> {
        self.inner.create_instance(payload)
    }

    fn update_template_watermark(&self, template_id: Uuid, date: NaiveDate) -> Result<(), StoreError> {
        self.inner.update_template_watermark(template_id, date)
    }

    fn replace_daily_adjustments(
        &self,
        template_id: Uuid,
        month: YearMonth,
        adjustments: BTreeMap<String, Decimal>,
    ) -> Result<(), StoreError> {
        self.inner
            .replace_daily_adjustments(template_id, month, adjustments)
    }
}

/// Panics while reading date keys for one template.
pub struct PanickingStore {
    pub inner: MemoryStore,
    pub poisoned: Uuid,
}

impl RecordStore for PanickingStore {
    fn find_active_templates(&self) -> Result<Vec<RecurringTemplate>, StoreError> {
        self.inner.find_active_templates()
    }

    fn find_instance_date_keys(&self, template_id: Uuid) -> Result<HashSet<String>, StoreError> {
        if template_id == self.poisoned {
            panic!("date key index corrupted for {template_id}");
        }
        self.inner.find_instance_date_keys(template_id)
    }

    fn create_instance(&self, payload: NewInstance) -> Result<ExpenseInstance, StoreError> {
        self.inner.create_instance(payload)
    }

    fn update_template_watermark(&self, template_id: Uuid, date: NaiveDate) -> Result<(), StoreError> {
        self.inner.update_template_watermark(template_id, date)
    }

    fn replace_daily_adjustments(
        &self,
        template_id: Uuid,
        month: YearMonth,
        adjustments: BTreeMap<String, Decimal>,
    ) -> Result<(), StoreError> {
        self.inner
            .replace_daily_adjustments(template_id, month, adjustments)
    }
}
