#![doc(test(attr(deny(warnings))))]

//! Expense Core turns recurring expense templates into dated expense instances.
//!
//! A run walks every active template from its watermark up to the process date, creates
//! at most one instance per template and date, and then advances the watermark.

pub mod config;
pub mod errors;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod time;
pub mod utils;

use std::sync::Once;

pub use config::{AmountPolicy, ConfigManager, SchedulerConfig};
pub use recurrence::{RecurrenceCalculator, RecurrencePattern, RecurringTemplate};
pub use scheduler::{AdjustmentService, CancellationFlag, ExpenseScheduler, RunReport};
pub use store::{JsonRecordStore, MemoryStore, RecordStore};

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(None);
        tracing::info!("Expense Core tracing initialized.");
    });
}

/// Like [`init`], honouring the `log_filter` directive from a loaded config.
pub fn init_with(config: &SchedulerConfig) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(config.log_filter.as_deref());
        tracing::info!("Expense Core tracing initialized.");
    });
}
