//! Store configuration loading.
//!
//! # Responsibility
//! - Describe how the backing store is opened and how repositories behave
//!   on top of it.
//! - Load and merge TOML configuration layers.
//!
//! # Invariants
//! - The driver is a closed set resolved once when the store is opened.
//! - Later layers override earlier ones key by key; nested tables merge.
//! - A loaded configuration always has a non-empty `dsn`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default wait for a locked database before failing, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Supported backing-store drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    Sqlite,
}

/// Backing-store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub driver: Driver,
    /// Database file path, or `:memory:`.
    pub dsn: String,
    /// Log every rendered statement.
    pub debug: bool,
    /// Reuse prepared statements through the connection cache.
    pub prepare_stmt: bool,
    /// Insert multiple records without an implicit transaction.
    pub skip_default_transaction: bool,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Sqlite,
            dsn: ":memory:".to_string(),
            debug: false,
            prepare_stmt: false,
            skip_default_transaction: false,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Loads and merges TOML files in order; later files win.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> ConfigResult<Self> {
        let mut layers = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let table = toml::from_str::<toml::Table>(&text).map_err(|source| {
                ConfigError::Parse {
                    origin: path.display().to_string(),
                    source,
                }
            })?;
            layers.push(table);
        }
        Self::from_tables(layers)
    }

    /// Merges in-memory tables in order; later tables win.
    pub fn from_tables(tables: impl IntoIterator<Item = toml::Table>) -> ConfigResult<Self> {
        let mut merged = toml::Table::new();
        for table in tables {
            merge_tables(&mut merged, table);
        }

        let config: Self = toml::Value::Table(merged)
            .try_into()
            .map_err(|source| ConfigError::Parse {
                origin: "merged configuration".to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Throwaway configuration with statement logging enabled.
    pub fn one_off(dsn: &str) -> ConfigResult<Self> {
        let config = Self {
            dsn: dsn.trim().to_string(),
            debug: true,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.dsn.trim().is_empty() {
            return Err(ConfigError::Invalid("dsn cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.dsn == ":memory:"
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        origin: String,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { origin, source } => write!(f, "invalid config in {origin}: {source}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}
