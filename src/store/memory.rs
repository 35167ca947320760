use std::{
    collections::{BTreeMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    errors::StoreError,
    recurrence::{ExpenseInstance, NewInstance, RecurringTemplate, YearMonth},
};

use super::{advance_watermark, apply_adjustments, ensure_unique, RecordStore, Result};

#[derive(Debug, Default)]
struct MemoryState {
    templates: Vec<RecurringTemplate>,
    instances: Vec<ExpenseInstance>,
}

/// Mutex-backed in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: impl IntoIterator<Item = RecurringTemplate>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                templates: templates.into_iter().collect(),
                instances: Vec::new(),
            }),
        }
    }

    /// Inserts or replaces a template by id.
    pub fn upsert_template(&self, template: RecurringTemplate) -> Result<()> {
        let mut state = self.lock()?;
        match state.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => state.templates.push(template),
        }
        Ok(())
    }

    pub fn template(&self, id: Uuid) -> Result<Option<RecurringTemplate>> {
        Ok(self.lock()?.templates.iter().find(|t| t.id == id).cloned())
    }

    pub fn instances(&self) -> Result<Vec<ExpenseInstance>> {
        Ok(self.lock()?.instances.clone())
    }

    pub fn instances_for(&self, template_id: Uuid) -> Result<Vec<ExpenseInstance>> {
        Ok(self
            .lock()?
            .instances
            .iter()
            .filter(|instance| instance.parent_template_id == template_id)
            .cloned()
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

impl RecordStore for MemoryStore {
    fn find_active_templates(&self) -> Result<Vec<RecurringTemplate>> {
        Ok(self
            .lock()?
            .templates
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    fn find_instance_date_keys(&self, template_id: Uuid) -> Result<HashSet<String>> {
        Ok(self
            .lock()?
            .instances
            .iter()
            .filter(|instance| instance.parent_template_id == template_id)
            .map(ExpenseInstance::date_key)
            .collect())
    }

    fn create_instance(&self, payload: NewInstance) -> Result<ExpenseInstance> {
        let mut state = self.lock()?;
        ensure_unique(&state.instances, &payload)?;
        let instance = payload.into_instance(Uuid::new_v4());
        state.instances.push(instance.clone());
        Ok(instance)
    }

    fn update_template_watermark(&self, template_id: Uuid, date: NaiveDate) -> Result<()> {
        let mut state = self.lock()?;
        let template = state
            .templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or(StoreError::TemplateNotFound(template_id))?;
        advance_watermark(template, date);
        Ok(())
    }

    fn replace_daily_adjustments(
        &self,
        template_id: Uuid,
        month: YearMonth,
        adjustments: BTreeMap<String, Decimal>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        let template = state
            .templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or(StoreError::TemplateNotFound(template_id))?;
        apply_adjustments(template, month, adjustments);
        Ok(())
    }
}
