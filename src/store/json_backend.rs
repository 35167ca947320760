use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::StoreError,
    recurrence::{ExpenseInstance, NewInstance, RecurringTemplate, YearMonth},
    utils::{
        persistence::{load_json, save_json_atomic},
        PathResolver,
    },
};

use super::{advance_watermark, apply_adjustments, ensure_unique, RecordStore, Result};

pub const RECORDS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsDocument {
    #[serde(default = "RecordsDocument::default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub templates: Vec<RecurringTemplate>,
    #[serde(default)]
    pub instances: Vec<ExpenseInstance>,
}

impl RecordsDocument {
    fn default_schema_version() -> u32 {
        RECORDS_SCHEMA_VERSION
    }
}

impl Default for RecordsDocument {
    fn default() -> Self {
        Self {
            schema_version: RECORDS_SCHEMA_VERSION,
            templates: Vec::new(),
            instances: Vec::new(),
        }
    }
}

/// Single-document JSON store; every write replaces the file atomically.
///
/// Writes are serialized within the process. Separate processes sharing one file are not
/// coordinated.
#[derive(Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let base = PathResolver::resolve_base(root);
        std::fs::create_dir_all(&base)?;
        Ok(Self::at_path(PathResolver::records_file_in(&base)))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<RecordsDocument> {
        let document: Option<RecordsDocument> = load_json(&self.path)?;
        let document = document.unwrap_or_default();
        if document.schema_version > RECORDS_SCHEMA_VERSION {
            return Err(StoreError::Backend(format!(
                "records file `{}` is from a newer schema version ({})",
                self.path.display(),
                document.schema_version
            )));
        }
        Ok(document)
    }

    pub fn upsert_template(&self, template: RecurringTemplate) -> Result<()> {
        self.modify(|document| {
            match document.templates.iter_mut().find(|t| t.id == template.id) {
                Some(existing) => *existing = template,
                None => document.templates.push(template),
            }
            Ok(())
        })
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Backend("json store lock poisoned".into()))
    }

    fn modify<T>(&self, apply: impl FnOnce(&mut RecordsDocument) -> Result<T>) -> Result<T> {
        let _guard = self.guard()?;
        let mut document = self.load()?;
        let value = apply(&mut document)?;
        document.schema_version = RECORDS_SCHEMA_VERSION;
        save_json_atomic(&document, &self.path)?;
        Ok(value)
    }

    fn modify_template(
        &self,
        template_id: Uuid,
        apply: impl FnOnce(&mut RecurringTemplate),
    ) -> Result<()> {
        self.modify(|document| {
            let template = document
                .templates
                .iter_mut()
                .find(|t| t.id == template_id)
                .ok_or(StoreError::TemplateNotFound(template_id))?;
            apply(template);
            Ok(())
        })
    }
}

impl RecordStore for JsonRecordStore {
    fn find_active_templates(&self) -> Result<Vec<RecurringTemplate>> {
        Ok(self
            .load()?
            .templates
            .into_iter()
            .filter(|t| t.is_active)
            .collect())
    }

    fn find_instance_date_keys(&self, template_id: Uuid) -> Result<HashSet<String>> {
        Ok(self
            .load()?
            .instances
            .iter()
            .filter(|instance| instance.parent_template_id == template_id)
            .map(ExpenseInstance::date_key)
            .collect())
    }

    fn create_instance(&self, payload: NewInstance) -> Result<ExpenseInstance> {
        self.modify(|document| {
            ensure_unique(&document.instances, &payload)?;
            let instance = payload.into_instance(Uuid::new_v4());
            document.instances.push(instance.clone());
            Ok(instance)
        })
    }

    fn update_template_watermark(&self, template_id: Uuid, date: NaiveDate) -> Result<()> {
        self.modify_template(template_id, |template| advance_watermark(template, date))
    }

    fn replace_daily_adjustments(
        &self,
        template_id: Uuid,
        month: YearMonth,
        adjustments: BTreeMap<String, Decimal>,
    ) -> Result<()> {
        self.modify_template(template_id, |template| {
            apply_adjustments(template, month, adjustments)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_store_has_no_templates() {
        let dir = tempdir().unwrap();
        let store = JsonRecordStore::new(Some(dir.path().to_path_buf())).unwrap();
        assert!(store.find_active_templates().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let dir = tempdir().unwrap();
        let store = JsonRecordStore::new(Some(dir.path().to_path_buf())).unwrap();
        std::fs::write(store.path(), r#"{ "schemaVersion": 99 }"#).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Backend(_))));
    }

    #[test]
    fn duplicate_instance_is_refused_without_rewriting() {
        let dir = tempdir().unwrap();
        let store = JsonRecordStore::new(Some(dir.path().to_path_buf())).unwrap();
        let payload = NewInstance {
            parent_template_id: Uuid::new_v4(),
            occurrence_date: date(2025, 1, 1),
            amount: dec!(10),
            description: "Supplies".into(),
            category: None,
            payment_method: None,
            user_id: None,
        };
        store.create_instance(payload.clone()).unwrap();
        assert!(matches!(
            store.create_instance(payload),
            Err(StoreError::DuplicateInstance { .. })
        ));
        assert_eq!(store.load().unwrap().instances.len(), 1);
    }

    #[test]
    fn watermark_and_adjustments_persist() {
        let dir = tempdir().unwrap();
        let store = JsonRecordStore::new(Some(dir.path().to_path_buf())).unwrap();
        let template = RecurringTemplate::new("Rent", dec!(3000), date(2025, 1, 1));
        let id = template.id;
        store.upsert_template(template).unwrap();

        store.update_template_watermark(id, date(2025, 2, 1)).unwrap();
        let mut adjustments = BTreeMap::new();
        adjustments.insert("2025-03-15".to_string(), dec!(5000));
        store
            .replace_daily_adjustments(id, "2025-03".parse().unwrap(), adjustments)
            .unwrap();

        let reopened = JsonRecordStore::new(Some(dir.path().to_path_buf())).unwrap();
        let stored = reopened.find_active_templates().unwrap().remove(0);
        assert_eq!(stored.last_processed, Some(date(2025, 2, 1)));
        assert_eq!(stored.adjustments_month.as_deref(), Some("2025-03"));
        assert_eq!(stored.daily_adjustments.get("2025-03-15"), Some(&dec!(5000)));
    }
}
