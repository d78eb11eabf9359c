//! File-source loader: scans directories for YAML files matching configured globs.

use super::{reject_if_empty, ConfigLoader};
use crate::config::{ConfigSet, DatabaseDefinition, EndpointDefinition, QueryDefinition};
use async_trait::async_trait;
use cordal_error::{CordalError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directories and glob patterns the file-source loader scans, per spec §6.
#[derive(Debug, Clone)]
pub struct FileLoaderConfig {
    /// Directories to scan, in order. Each is scanned non-recursively.
    pub directories: Vec<PathBuf>,
    /// Filename globs admitting a file as a database-definition source.
    pub database_globs: Vec<String>,
    /// Filename globs admitting a file as a query-definition source.
    pub query_globs: Vec<String>,
    /// Filename globs admitting a file as an endpoint-definition source.
    pub endpoint_globs: Vec<String>,
}

impl FileLoaderConfig {
    /// A config with the default globs from spec §6, scanning `directories`.
    #[must_use]
    pub fn with_defaults(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            database_globs: vec!["*-database.yml".to_string(), "*-databases.yml".to_string()],
            query_globs: vec!["*-query.yml".to_string(), "*-queries.yml".to_string()],
            endpoint_globs: vec![
                "*-endpoint.yml".to_string(),
                "*-endpoints.yml".to_string(),
                "*-api.yml".to_string(),
            ],
        }
    }
}

/// Top-level shape of one admitted YAML file: exactly one of the three kinds.
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    databases: HashMap<String, DatabaseDefinition>,
    #[serde(default)]
    queries: HashMap<String, QueryDefinition>,
    #[serde(default)]
    endpoints: HashMap<String, EndpointDefinition>,
}

/// Reads database/query/endpoint definitions from YAML files on disk.
pub struct FileLoader {
    config: FileLoaderConfig,
}

impl FileLoader {
    /// Build a loader over `config`.
    #[must_use]
    pub const fn new(config: FileLoaderConfig) -> Self {
        Self { config }
    }

    fn admitted_files(&self, dir: &Path, globs: &[String]) -> Result<Vec<PathBuf>> {
        let mut matches = Vec::new();
        let entries = std::fs::read_dir(dir).map_err(|e| CordalError::ParseError {
            location: dir.display().to_string(),
            message:  e.to_string(),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| CordalError::ParseError {
                location: dir.display().to_string(),
                message:  e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if globs
                .iter()
                .filter_map(|g| glob::Pattern::new(g).ok())
                .any(|p| p.matches(name))
            {
                matches.push(path);
            }
        }
        matches.sort();
        Ok(matches)
    }

    fn load_kind<T, F>(
        &self,
        globs: &[String],
        kind: &'static str,
        extract: F,
    ) -> Result<HashMap<String, T>>
    where
        T: Clone,
        F: Fn(ConfigFile) -> HashMap<String, T>,
    {
        let mut merged: HashMap<String, T> = HashMap::new();
        let mut origin: HashMap<String, PathBuf> = HashMap::new();

        for dir in &self.config.directories {
            for path in self.admitted_files(dir, globs)? {
                let text = std::fs::read_to_string(&path).map_err(|e| CordalError::ParseError {
                    location: path.display().to_string(),
                    message:  e.to_string(),
                })?;
                let file: ConfigFile =
                    serde_yaml::from_str(&text).map_err(|e| CordalError::ParseError {
                        location: path.display().to_string(),
                        message:  e.to_string(),
                    })?;

                for (name, value) in extract(file) {
                    if let Some(first) = origin.get(&name) {
                        return Err(CordalError::DuplicateName {
                            kind,
                            name,
                            first: first.clone(),
                            second: path,
                        });
                    }
                    origin.insert(name.clone(), path.clone());
                    merged.insert(name, value);
                }
            }
        }

        Ok(merged)
    }
}

#[async_trait]
impl ConfigLoader for FileLoader {
    async fn load(&self) -> Result<ConfigSet> {
        let databases = self.load_kind(&self.config.database_globs, "database", |f| f.databases)?;
        let queries = self.load_kind(&self.config.query_globs, "query", |f| f.queries)?;
        let endpoints = self.load_kind(&self.config.endpoint_globs, "endpoint", |f| f.endpoints)?;

        let config = ConfigSet {
            databases,
            queries,
            endpoints,
        };
        reject_if_empty(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn loads_and_merges_across_files() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "main-database.yml",
            "databases:\n  primary:\n    name: primary\n    url: postgres://localhost/test\n",
        );
        write(
            dir.path(),
            "users-query.yml",
            "queries:\n  find_user:\n    name: find_user\n    database_name: primary\n    sql: \"SELECT * FROM users WHERE id = ?\"\n    parameters:\n      - name: id\n        scalar_type: LONG\n        source: PATH\n",
        );
        write(
            dir.path(),
            "users-endpoint.yml",
            "endpoints:\n  find_user:\n    name: find_user\n    path: /api/users/{id}\n    method: GET\n    query_name: find_user\n",
        );

        let loader = FileLoader::new(FileLoaderConfig::with_defaults(vec![dir.path().to_path_buf()]));
        let config = loader.load().await.unwrap();
        assert_eq!(config.databases.len(), 1);
        assert_eq!(config.queries.len(), 1);
        assert_eq!(config.endpoints.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_name_across_files_is_an_error() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "a-database.yml",
            "databases:\n  primary:\n    name: primary\n    url: postgres://localhost/a\n",
        );
        write(
            dir.path(),
            "b-databases.yml",
            "databases:\n  primary:\n    name: primary\n    url: postgres://localhost/b\n",
        );

        let loader = FileLoader::new(FileLoaderConfig::with_defaults(vec![dir.path().to_path_buf()]));
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, CordalError::DuplicateName { .. }));
    }

    #[tokio::test]
    async fn empty_kind_is_rejected() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "main-database.yml",
            "databases:\n  primary:\n    name: primary\n    url: postgres://localhost/test\n",
        );
        let loader = FileLoader::new(FileLoaderConfig::with_defaults(vec![dir.path().to_path_buf()]));
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, CordalError::EmptyConfiguration { kind: "queries" }));
    }
}
