//! Configuration State Manager (C10): snapshot/delta/rollback of the live configuration set.

use crate::config::{validator, ConfigSet};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// An immutable, versioned capture of the three configuration maps, per spec §3.
#[derive(Debug, Clone)]
pub struct ConfigurationSnapshot {
    /// Monotonic version, assigned in creation order (`"v1"`, `"v2"`, ...).
    pub version: String,
    /// The captured configuration.
    pub config: ConfigSet,
    /// Milliseconds since the Unix epoch when this snapshot was created.
    pub created_at_millis: u128,
}

/// Per-kind added/updated/removed name sets between two snapshots, per spec §3.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationDelta {
    /// Database name changes.
    pub databases: KindDelta,
    /// Query name changes.
    pub queries: KindDelta,
    /// Endpoint name changes.
    pub endpoints: KindDelta,
}

/// Added/updated/removed names for one configuration kind.
#[derive(Debug, Clone, Default)]
pub struct KindDelta {
    /// Names present only in the new set.
    pub added: Vec<String>,
    /// Names present in both sets with a changed definition.
    pub updated: Vec<String>,
    /// Names present only in the old set.
    pub removed: Vec<String>,
}

impl KindDelta {
    /// `true` if nothing changed between the two sets this delta was computed from.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    fn compute<T: PartialEq>(old: &HashMap<String, T>, new: &HashMap<String, T>) -> Self {
        let old_names: HashSet<&String> = old.keys().collect();
        let new_names: HashSet<&String> = new.keys().collect();

        let added = new_names.difference(&old_names).map(|s| (*s).clone()).collect();
        let removed = old_names.difference(&new_names).map(|s| (*s).clone()).collect();
        let updated = old_names
            .intersection(&new_names)
            .filter(|name| old.get(**name) != new.get(**name))
            .map(|s| (*s).clone())
            .collect();

        Self {
            added,
            updated,
            removed,
        }
    }
}

impl ConfigurationDelta {
    /// `true` if nothing changed across all three kinds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.databases.is_empty() && self.queries.is_empty() && self.endpoints.is_empty()
    }

    fn compute(old: &ConfigSet, new: &ConfigSet) -> Self {
        Self {
            databases: KindDelta::compute(&old.databases, &new.databases),
            queries: KindDelta::compute(&old.queries, &new.queries),
            endpoints: KindDelta::compute(&old.endpoints, &new.endpoints),
        }
    }
}

/// Holds a bounded history of [`ConfigurationSnapshot`]s, per spec §4.10.
pub struct SnapshotHistory {
    history: Mutex<Vec<ConfigurationSnapshot>>,
    limit: usize,
    next_version: Mutex<u64>,
}

impl SnapshotHistory {
    /// A history retaining at most `limit` snapshots (oldest dropped first).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            limit: limit.max(1),
            next_version: Mutex::new(1),
        }
    }

    /// Store `config` immutably as a new snapshot and return its version.
    pub fn snapshot(&self, config: ConfigSet, created_at_millis: u128) -> String {
        let mut version_guard = self.next_version.lock().expect("snapshot version mutex poisoned");
        let version = format!("v{}", *version_guard);
        *version_guard += 1;
        drop(version_guard);

        let mut history = self.history.lock().expect("snapshot history mutex poisoned");
        history.push(ConfigurationSnapshot {
            version: version.clone(),
            config,
            created_at_millis,
        });
        if history.len() > self.limit {
            let overflow = history.len() - self.limit;
            history.drain(0..overflow);
        }
        version
    }

    /// Compute the delta from snapshot `from_version` to `new`, per spec §4.10.
    #[must_use]
    pub fn delta(&self, from_version: &str, new: &ConfigSet) -> Option<ConfigurationDelta> {
        let history = self.history.lock().expect("snapshot history mutex poisoned");
        let from = history.iter().find(|s| s.version == from_version)?;
        Some(ConfigurationDelta::compute(&from.config, new))
    }

    /// Return the named snapshot, if still held in history.
    #[must_use]
    pub fn rollback(&self, version: &str) -> Option<ConfigurationSnapshot> {
        let history = self.history.lock().expect("snapshot history mutex poisoned");
        history.iter().find(|s| s.version == version).cloned()
    }

    /// The most recently stored snapshot, if any.
    #[must_use]
    pub fn latest(&self) -> Option<ConfigurationSnapshot> {
        let history = self.history.lock().expect("snapshot history mutex poisoned");
        history.last().cloned()
    }

    /// Validate that every name referenced after applying `delta` still
    /// resolves in `all`, per spec §4.10's structural-reachability check.
    #[must_use]
    pub fn validate_delta(&self, all: &ConfigSet) -> validator::ValidationReport {
        validator::validate(all)
    }
}
