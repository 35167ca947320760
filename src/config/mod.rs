use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{
    errors::ConfigFileError,
    recurrence::{OccurrenceEnumerator, RecurrenceCalculator, DEFAULT_MAX_OCCURRENCES_PER_RUN},
    utils::{
        persistence::{load_json, save_json_atomic},
        PathResolver,
    },
};

/// Calendar averages used to convert amounts between pattern units.
///
/// These are policy, not derived facts; leap Februaries are not special-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountPolicy {
    pub days_per_month: Decimal,
    pub weeks_per_month: Decimal,
}

impl Default for AmountPolicy {
    fn default() -> Self {
        Self {
            days_per_month: dec!(30.44),
            weeks_per_month: dec!(4.33),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    #[serde(default = "SchedulerConfig::default_max_occurrences")]
    pub max_occurrences_per_run: usize,
    #[serde(default)]
    pub amount_policy: AmountPolicy,
    /// Templates processed in parallel; 1 keeps the run on the calling thread.
    #[serde(default = "SchedulerConfig::default_workers")]
    pub worker_threads: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_occurrences_per_run: DEFAULT_MAX_OCCURRENCES_PER_RUN,
            amount_policy: AmountPolicy::default(),
            worker_threads: 1,
            log_filter: None,
        }
    }
}

impl SchedulerConfig {
    fn default_max_occurrences() -> usize {
        DEFAULT_MAX_OCCURRENCES_PER_RUN
    }

    fn default_workers() -> usize {
        1
    }

    /// A zero cap would stall every template, so it is raised to 1.
    pub fn enumerator(&self) -> OccurrenceEnumerator {
        OccurrenceEnumerator::new(self.max_occurrences_per_run.max(1))
    }

    pub fn calculator(&self) -> RecurrenceCalculator {
        RecurrenceCalculator::new(self.amount_policy.clone())
    }
}

/// Loads and saves [`SchedulerConfig`] as JSON.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_base_dir(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Self {
        Self {
            path: PathResolver::config_file_in(&base),
        }
    }

    /// Missing files yield the defaults.
    pub fn load(&self) -> Result<SchedulerConfig, ConfigFileError> {
        Ok(load_json(&self.path)?.unwrap_or_default())
    }

    pub fn save(&self, config: &SchedulerConfig) -> Result<(), ConfigFileError> {
        save_json_atomic(config, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
