pub mod persistence;

use std::{env, path::PathBuf, sync::Once};

use dirs::home_dir;

const DEFAULT_DIR_NAME: &str = ".expense_core";
const HOME_ENV: &str = "EXPENSE_CORE_HOME";
const CONFIG_FILE: &str = "config.json";
const RECORDS_FILE: &str = "records.json";

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber with sensible defaults.
///
/// `extra_directive` is appended to the `RUST_LOG` filter, e.g. `expense_core=debug`.
pub fn init_tracing(extra_directive: Option<&str>) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        for directive in ["expense_core=info"].into_iter().chain(extra_directive) {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }

        // A subscriber installed by the host application takes precedence.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}

/// Resolves the on-disk locations used by the file-backed store and configuration.
pub struct PathResolver;

impl PathResolver {
    /// `$EXPENSE_CORE_HOME`, falling back to `~/.expense_core`.
    pub fn base_dir() -> PathBuf {
        if let Some(custom) = env::var_os(HOME_ENV) {
            return PathBuf::from(custom);
        }
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    pub fn resolve_base(root: Option<PathBuf>) -> PathBuf {
        root.unwrap_or_else(Self::base_dir)
    }

    pub fn config_file_in(base: &std::path::Path) -> PathBuf {
        base.join(CONFIG_FILE)
    }

    pub fn records_file_in(base: &std::path::Path) -> PathBuf {
        base.join(RECORDS_FILE)
    }
}
