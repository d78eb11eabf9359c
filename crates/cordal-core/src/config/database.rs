//! `DatabaseDefinition`: a named pooled connection target.

use serde::{Deserialize, Serialize};

/// Pool-sizing and timeout parameters for one [`DatabaseDefinition`].
///
/// Field names mirror the store schema of `config_databases` (see spec §6)
/// so that the file-source and store-source loaders can share one `serde`
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolParameters {
    /// Upper bound on pooled connections for this database.
    #[serde(default = "PoolParameters::default_max_pool_size")]
    pub max_pool_size: u32,
    /// Connections kept idle and ready below `max_pool_size`.
    #[serde(default)]
    pub min_idle: u32,
    /// Timeout acquiring a connection from the pool, in milliseconds.
    #[serde(default = "PoolParameters::default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Idle connections older than this are closed, in milliseconds.
    #[serde(default = "PoolParameters::default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Connections older than this are recycled regardless of activity, in milliseconds.
    #[serde(default = "PoolParameters::default_max_lifetime_ms")]
    pub max_lifetime_ms: u64,
    /// Connections borrowed longer than this are logged as a probable leak, in milliseconds.
    #[serde(default)]
    pub leak_detection_ms: Option<u64>,
    /// Query issued to validate a connection's liveness.
    #[serde(default = "PoolParameters::default_health_check_query")]
    pub health_check_query: String,
}

impl PoolParameters {
    const fn default_max_pool_size() -> u32 {
        10
    }

    const fn default_connection_timeout_ms() -> u64 {
        30_000
    }

    const fn default_idle_timeout_ms() -> u64 {
        600_000
    }

    const fn default_max_lifetime_ms() -> u64 {
        1_800_000
    }

    fn default_health_check_query() -> String {
        "SELECT 1".to_string()
    }

    /// `true` when `0 <= min_idle <= max_pool_size` and every timeout is positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_idle <= self.max_pool_size
            && self.connection_timeout_ms > 0
            && self.idle_timeout_ms > 0
            && self.max_lifetime_ms > 0
    }
}

impl Default for PoolParameters {
    fn default() -> Self {
        Self {
            max_pool_size: Self::default_max_pool_size(),
            min_idle: 0,
            connection_timeout_ms: Self::default_connection_timeout_ms(),
            idle_timeout_ms: Self::default_idle_timeout_ms(),
            max_lifetime_ms: Self::default_max_lifetime_ms(),
            leak_detection_ms: None,
            health_check_query: Self::default_health_check_query(),
        }
    }
}

/// A named backend relational database and its pool parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDefinition {
    /// Unique name, used as the pool-manager key and query FK target.
    pub name: String,
    /// Connection URL (driver-specific DSN).
    pub url: String,
    /// Driver identifier, e.g. `"postgresql"`.
    #[serde(default = "DatabaseDefinition::default_driver")]
    pub driver: String,
    /// Username, if not embedded in `url`.
    #[serde(default)]
    pub username: Option<String>,
    /// Password, if not embedded in `url`.
    #[serde(default)]
    pub password: Option<String>,
    /// Pool sizing and timeout parameters.
    #[serde(default)]
    pub pool: PoolParameters,
    /// Free-text description, surfaced in the config introspection endpoints.
    #[serde(default)]
    pub description: Option<String>,
}

impl DatabaseDefinition {
    fn default_driver() -> String {
        "postgresql".to_string()
    }

    /// Validate this definition's pool parameters in isolation.
    ///
    /// Name-uniqueness across a [`super::ConfigSet`] is checked by the
    /// validator, not here, since it requires the whole map.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.url.is_empty() && self.pool.is_valid()
    }
}
