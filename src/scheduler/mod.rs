//! Run orchestration: active templates in, instances and watermarks out.

pub mod adjustments;
pub mod materializer;

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    config::SchedulerConfig,
    errors::{SchedulerError, TemplateError},
    recurrence::{normalize, NewInstance, OccurrenceEnumerator, RecurringTemplate},
    store::RecordStore,
    time::{Clock, SystemClock},
};

pub use adjustments::AdjustmentService;
pub use materializer::{InstanceMaterializer, Materialization};

/// Cooperative cancellation shared with the caller; checked between templates.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one template during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRun {
    pub template_id: Uuid,
    pub label: Option<String>,
    pub occurrences: usize,
    pub created: usize,
    pub skipped: usize,
    /// Watermark written by this run, or the one a dry run would have written.
    pub watermark: Option<NaiveDate>,
    pub capped: bool,
    pub previews: Vec<NewInstance>,
}

impl TemplateRun {
    fn new(template_id: Uuid) -> Self {
        Self {
            template_id,
            label: None,
            occurrences: 0,
            created: 0,
            skipped: 0,
            watermark: None,
            capped: false,
            previews: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct TemplateFailure {
    pub template_id: Uuid,
    pub description: String,
    pub error: TemplateError,
}

/// Aggregate outcome of [`ExpenseScheduler::process_all`].
#[derive(Debug)]
pub struct RunReport {
    pub process_date: NaiveDate,
    pub dry_run: bool,
    /// Templates examined, including those that failed.
    pub templates_processed: usize,
    pub instances_created: usize,
    pub instances_skipped: usize,
    pub per_template_errors: Vec<TemplateFailure>,
    pub templates: Vec<TemplateRun>,
    pub cancelled: bool,
}

impl RunReport {
    fn new(process_date: NaiveDate, dry_run: bool) -> Self {
        Self {
            process_date,
            dry_run,
            templates_processed: 0,
            instances_created: 0,
            instances_skipped: 0,
            per_template_errors: Vec::new(),
            templates: Vec::new(),
            cancelled: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.per_template_errors.is_empty()
    }

    pub fn template(&self, template_id: Uuid) -> Option<&TemplateRun> {
        self.templates.iter().find(|run| run.template_id == template_id)
    }

    fn record(&mut self, run: TemplateRun, failure: Option<TemplateFailure>) {
        self.templates_processed += 1;
        self.instances_created += run.created;
        self.instances_skipped += run.skipped;
        self.templates.push(run);
        if let Some(failure) = failure {
            self.per_template_errors.push(failure);
        }
    }
}

/// Per-template result: run detail plus the failure, if any.
pub type TemplateOutcome = (TemplateRun, Option<TemplateFailure>);

/// Drives enumeration and materialization for every active template.
pub struct ExpenseScheduler {
    store: Arc<dyn RecordStore>,
    enumerator: OccurrenceEnumerator,
    workers: usize,
    clock: Arc<dyn Clock>,
    cancellation: CancellationFlag,
}

impl ExpenseScheduler {
    pub fn new(store: Arc<dyn RecordStore>, config: &SchedulerConfig) -> Self {
        Self {
            store,
            enumerator: config.enumerator(),
            workers: config.worker_threads.max(1),
            clock: Arc::new(SystemClock),
            cancellation: CancellationFlag::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Materializes every occurrence up to `process_date` (today when `None`).
    ///
    /// Only a failure to list the active templates aborts the run; everything else is
    /// recorded per template in the report.
    pub fn process_all(
        &self,
        process_date: Option<NaiveDate>,
        dry_run: bool,
    ) -> Result<RunReport, SchedulerError> {
        let process_date = process_date.unwrap_or_else(|| self.clock.today());
        let templates = self
            .store
            .find_active_templates()
            .map_err(SchedulerError::TemplateLoad)?;
        tracing::info!(
            %process_date,
            dry_run,
            templates = templates.len(),
            "starting recurring expense run"
        );

        let mut report = RunReport::new(process_date, dry_run);
        let outcomes = if self.workers > 1 && templates.len() > 1 {
            self.run_parallel(&templates, process_date, dry_run)
        } else {
            self.run_sequential(&templates, process_date, dry_run)
        };
        let completed = outcomes.len();
        for (run, failure) in outcomes {
            report.record(run, failure);
        }
        report.cancelled = completed < templates.len();

        tracing::info!(
            templates = report.templates_processed,
            created = report.instances_created,
            skipped = report.instances_skipped,
            errors = report.per_template_errors.len(),
            cancelled = report.cancelled,
            "recurring expense run finished"
        );
        Ok(report)
    }

    /// Dry run: reports the instances that would be created without writing anything.
    pub fn preview(&self, process_date: Option<NaiveDate>) -> Result<RunReport, SchedulerError> {
        self.process_all(process_date, true)
    }

    fn run_sequential(
        &self,
        templates: &[RecurringTemplate],
        process_date: NaiveDate,
        dry_run: bool,
    ) -> Vec<TemplateOutcome> {
        let mut outcomes = Vec::with_capacity(templates.len());
        for template in templates {
            if self.cancellation.is_cancelled() {
                tracing::info!("run cancelled before template {}", template.id);
                break;
            }
            outcomes.push(self.process_template(template, process_date, dry_run));
        }
        outcomes
    }

    /// Bounded pool over scoped threads; each template still runs start to finish on one
    /// worker. Outcomes come back in template order. A template whose worker panicked is
    /// reported as failed.
    fn run_parallel(
        &self,
        templates: &[RecurringTemplate],
        process_date: NaiveDate,
        dry_run: bool,
    ) -> Vec<TemplateOutcome> {
        let next = AtomicUsize::new(0);
        let next = &next;
        let workers = self.workers.min(templates.len());
        let mut finished: Vec<(usize, TemplateOutcome)> = Vec::new();
        let mut panicked_workers = 0usize;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            if self.cancellation.is_cancelled() {
                                break;
                            }
                            let index = next.fetch_add(1, Ordering::SeqCst);
                            let Some(template) = templates.get(index) else {
                                break;
                            };
                            let outcome = self.process_template(template, process_date, dry_run);
                            done.push((index, outcome));
                        }
                        done
                    })
                })
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(done) => finished.extend(done),
                    Err(_) => panicked_workers += 1,
                }
            }
        });
        if panicked_workers > 0 {
            tracing::warn!(workers = panicked_workers, "scheduler worker panicked");
        }

        let claimed = next.load(Ordering::SeqCst).min(templates.len());
        let mut slots: Vec<Option<TemplateOutcome>> = (0..claimed).map(|_| None).collect();
        for (index, outcome) in finished {
            slots[index] = Some(outcome);
        }
        slots
            .into_iter()
            .zip(templates)
            .map(|(slot, template)| slot.unwrap_or_else(|| Self::panicked_outcome(template)))
            .collect()
    }

    fn panicked_outcome(template: &RecurringTemplate) -> TemplateOutcome {
        tracing::warn!(template = %template.id, "template lost to a panicked worker");
        let failure = TemplateFailure {
            template_id: template.id,
            description: template.description.clone(),
            error: TemplateError::WorkerPanicked,
        };
        (TemplateRun::new(template.id), Some(failure))
    }

    /// Enumerate, materialize, then advance the watermark once for a single template.
    pub fn process_template(
        &self,
        template: &RecurringTemplate,
        process_date: NaiveDate,
        dry_run: bool,
    ) -> TemplateOutcome {
        let mut run = TemplateRun::new(template.id);
        let failure = self
            .materialize_template(template, process_date, dry_run, &mut run)
            .err()
            .map(|error| {
                tracing::warn!(template = %template.id, %error, "template processing failed");
                TemplateFailure {
                    template_id: template.id,
                    description: template.description.clone(),
                    error,
                }
            });
        (run, failure)
    }

    fn materialize_template(
        &self,
        template: &RecurringTemplate,
        process_date: NaiveDate,
        dry_run: bool,
        run: &mut TemplateRun,
    ) -> Result<(), TemplateError> {
        let config = normalize(template)?;
        run.label = Some(config.label());

        let before_start = config.start_date.pred_opt().unwrap_or(config.start_date);
        let cursor = match template.last_processed {
            Some(last) if last >= config.start_date => last,
            Some(last) => {
                tracing::warn!(
                    template = %template.id,
                    %last,
                    start = %config.start_date,
                    "watermark precedes start date; walking from start"
                );
                before_start
            }
            None => before_start,
        };

        let batch = self.enumerator.occurrences_until(&config, cursor, process_date);
        run.occurrences = batch.dates.len();
        run.capped = batch.capped;
        if batch.capped {
            tracing::info!(
                template = %template.id,
                cap = self.enumerator.max_occurrences(),
                "occurrence cap reached; remaining dates deferred to the next run"
            );
        }
        tracing::debug!(
            template = %template.id,
            occurrences = batch.dates.len(),
            %cursor,
            "enumerated occurrences"
        );
        if batch.dates.is_empty() {
            return Ok(());
        }

        let mut existing: HashSet<String> = self.store.find_instance_date_keys(template.id)?;
        let mut handled_through = None;
        let mut failure = None;
        for date in &batch.dates {
            match InstanceMaterializer::materialize(
                self.store.as_ref(),
                template,
                *date,
                &mut existing,
                dry_run,
            ) {
                Ok(Materialization::Created(_)) => run.created += 1,
                Ok(Materialization::Preview(payload)) => run.previews.push(payload),
                Ok(Materialization::Skipped) => run.skipped += 1,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
            handled_through = Some(*date);
        }

        if let Some(last) = handled_through {
            run.watermark = Some(last);
            if !dry_run {
                if let Err(err) = self.store.update_template_watermark(template.id, last) {
                    run.watermark = None;
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
