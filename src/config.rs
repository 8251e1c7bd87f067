//! File-based configuration.
//!
//! Looked up at an explicit path, then `$GRAPHBASE_CONFIG`, then
//! `<config dir>/graphbase/config.toml`. A missing file yields the
//! defaults; every key is optional.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::DEFAULT_BASE_PATH;
use crate::storage::DEFAULT_NAMESPACE;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GRAPHBASE_CONFIG";

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphbaseConfig {
    /// `[store]` section.
    pub store: StoreConfig,
    /// `[catalog]` section.
    pub catalog: CatalogConfig,
}

/// Column-family store settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Namespace the graph tables are created in.
    pub namespace: String,
    /// Client connection properties for a networked store client. The
    /// in-process [`MemStore`](crate::kv::MemStore) ignores them.
    pub connection: BTreeMap<String, String>,
    /// Whether new tables use LZ4 compression.
    pub compression: bool,
    /// Number of regions new tables are pre-split into.
    pub splits: u32,
    /// Rows fetched per scanner round trip.
    pub scan_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            connection: BTreeMap::new(),
            compression: true,
            splits: 1,
            scan_batch_size: 100,
        }
    }
}

/// Coordination service settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Connection string of the coordination ensemble, handed to a networked
    /// coordinator client. The in-process
    /// [`MemCoordinator`](crate::catalog::MemCoordinator) ignores it.
    pub endpoint: String,
    /// Parent path of the graph entries.
    pub base_path: String,
    /// Session timeout in milliseconds, handed to a networked coordinator
    /// client. Sessions of the in-process coordinator never expire.
    pub session_timeout_ms: u64,
    /// Connection timeout in milliseconds.
    pub connection_timeout_ms: u64,
    /// Extra attempts after a lost connection.
    pub retry_count: u32,
    /// Pause between attempts in milliseconds.
    pub retry_sleep_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:2181".to_owned(),
            base_path: DEFAULT_BASE_PATH.to_owned(),
            session_timeout_ms: 20_000,
            connection_timeout_ms: 10_000,
            retry_count: 10,
            retry_sleep_ms: 100,
        }
    }
}

/// Failures while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`GraphbaseConfig`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },
    /// A setting is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl GraphbaseConfig {
    /// Loads the config file, falling back to defaults when none exists.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path);
        match path {
            Some(path) if path.exists() => read_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.namespace.is_empty() {
            return Err(ConfigError::Invalid("store.namespace is empty".into()));
        }
        if self.store.splits == 0 || self.store.splits > 65_536 {
            return Err(ConfigError::Invalid(format!(
                "store.splits must be in 1..=65536, got {}",
                self.store.splits
            )));
        }
        if self.store.scan_batch_size == 0 {
            return Err(ConfigError::Invalid("store.scan_batch_size is 0".into()));
        }
        if !self.catalog.base_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "catalog.base_path '{}' is not absolute",
                self.catalog.base_path
            )));
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<GraphbaseConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: GraphbaseConfig =
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

/// Default location of the config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("graphbase").join("config.toml"))
}
