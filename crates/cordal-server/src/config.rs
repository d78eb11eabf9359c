//! Process-level configuration: how CORDAL itself is started, as opposed to
//! the database/query/endpoint configuration the process serves.
//!
//! Grounded on the teacher's `fraiseql_server::config::{RuntimeConfig,
//! loader}`: env var selects an override path, falling back to a local
//! file, falling back to the OS config directory.

use cordal_error::{CordalError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "CORDAL_CONFIG";
const DEFAULT_CONFIG_FILENAME: &str = "cordal.toml";

/// Which configuration source (spec §6) the process reads databases/queries/endpoints from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Scan YAML files in configured directories.
    File,
    /// Read the `config_*` tables from a PostgreSQL store.
    Store,
}

/// File-source scanning parameters, active when `source = "file"`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileSourceConfig {
    /// Directories to scan, non-recursively, in order.
    pub directories: Vec<PathBuf>,
}

/// Store-source connection parameters, active when `source = "store"`.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSourceConfig {
    /// DSN for the configuration store database.
    pub url: String,
    /// When `true` and the store is empty at startup, import definitions
    /// from `file_source` instead of failing, per spec §6.
    #[serde(default)]
    pub import_from_file_on_empty: bool,
}

/// Reload pipeline knobs (C11).
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadConfig {
    /// Bounded retries for transient reload failures before giving up.
    #[serde(default = "ReloadConfig::default_max_attempts")]
    pub max_attempts: u32,
    /// Bounded snapshot history retained for rollback.
    #[serde(default = "ReloadConfig::default_history_limit")]
    pub history_limit: usize,
}

impl ReloadConfig {
    const fn default_max_attempts() -> u32 {
        3
    }

    const fn default_history_limit() -> usize {
        10
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            history_limit: Self::default_history_limit(),
        }
    }
}

/// File watcher knobs (C9).
#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    /// Debounce window after the last observed event before firing a reload, in milliseconds.
    #[serde(default = "WatcherConfig::default_debounce_ms")]
    pub debounce_ms: u64,
}

impl WatcherConfig {
    const fn default_debounce_ms() -> u64 {
        300
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::default_debounce_ms(),
        }
    }
}

/// Event bus worker pool sizing (C6).
#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
    /// Pending-event queue capacity before the bus drops and logs.
    #[serde(default = "EventBusConfig::default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum concurrently-running async subscriber dispatches.
    #[serde(default = "EventBusConfig::default_worker_concurrency")]
    pub worker_concurrency: usize,
}

impl EventBusConfig {
    const fn default_queue_capacity() -> usize {
        1_000
    }

    const fn default_worker_concurrency() -> usize {
        4
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Self::default_queue_capacity(),
            worker_concurrency: Self::default_worker_concurrency(),
        }
    }
}

/// Cache sweeper knobs (C5).
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSweepConfig {
    /// Interval between proactive expired-entry sweeps, in seconds.
    #[serde(default = "CacheSweepConfig::default_period_seconds")]
    pub period_seconds: u64,
}

impl CacheSweepConfig {
    const fn default_period_seconds() -> u64 {
        30
    }
}

impl Default for CacheSweepConfig {
    fn default() -> Self {
        Self {
            period_seconds: Self::default_period_seconds(),
        }
    }
}

/// Top-level process configuration, loaded once at startup from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to, e.g. `"0.0.0.0:8080"`.
    #[serde(default = "ServerConfig::default_bind_address")]
    pub bind_address: String,
    /// Which configuration source to load databases/queries/endpoints from.
    pub source: ConfigSource,
    /// Active when `source = "file"`.
    #[serde(default)]
    pub file_source: Option<FileSourceConfig>,
    /// Active when `source = "store"`.
    #[serde(default)]
    pub store_source: Option<StoreSourceConfig>,
    /// Reload pipeline knobs.
    #[serde(default)]
    pub reload: ReloadConfig,
    /// File watcher knobs.
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Event bus knobs.
    #[serde(default)]
    pub event_bus: EventBusConfig,
    /// Cache sweeper knobs.
    #[serde(default)]
    pub cache_sweep: CacheSweepConfig,
}

impl ServerConfig {
    const fn default_bind_address() -> String {
        String::new()
    }

    /// Parse `text` as TOML.
    ///
    /// # Errors
    /// Returns [`CordalError::ParseError`] on malformed TOML or a structurally invalid config.
    pub fn from_str(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text).map_err(|e| CordalError::ParseError {
            location: "<process config>".to_string(),
            message:  e.to_string(),
        })?;
        if config.bind_address.is_empty() {
            config.bind_address = "0.0.0.0:8080".to_string();
        }
        config.validate()
    }

    /// Read and parse the file at `path`.
    ///
    /// # Errors
    /// Returns [`CordalError::ParseError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CordalError::ParseError {
            location: path.display().to_string(),
            message:  e.to_string(),
        })?;
        Self::from_str(&text)
    }

    /// Resolve the configuration path following the env-var → local file →
    /// OS config dir fallback chain, and load it.
    ///
    /// # Errors
    /// Returns [`CordalError::ParseError`] if no configuration file can be found or parsed.
    pub fn load() -> Result<Self> {
        Self::load_with_path(resolve_path())
    }

    /// Load from an explicit path, bypassing the fallback chain. Exposed
    /// separately so tests and the CLI can point at a fixture file.
    ///
    /// # Errors
    /// Returns [`CordalError::ParseError`] if `path` cannot be read or parsed.
    pub fn load_with_path(path: PathBuf) -> Result<Self> {
        Self::from_file(&path)
    }

    fn validate(self) -> Result<Self> {
        match self.source {
            ConfigSource::File if self.file_source.is_none() => Err(CordalError::ConfigInvalid {
                message: "source = \"file\" requires a [file_source] section".to_string(),
            }),
            ConfigSource::Store if self.store_source.is_none() => Err(CordalError::ConfigInvalid {
                message: "source = \"store\" requires a [store_source] section".to_string(),
            }),
            _ => Ok(self),
        }
    }
}

fn resolve_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    let local = PathBuf::from(format!("./{DEFAULT_CONFIG_FILENAME}"));
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("cordal").join(DEFAULT_CONFIG_FILENAME))
        .unwrap_or(local)
}
