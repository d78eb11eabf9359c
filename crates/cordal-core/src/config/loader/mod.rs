//! Configuration Loader (C1): two interchangeable sources behind one contract.

mod file_loader;
mod store_loader;

pub use file_loader::{FileLoader, FileLoaderConfig};
pub use store_loader::StoreLoader;

use super::ConfigSet;
use async_trait::async_trait;
use cordal_error::{CordalError, Result};

/// Produces a [`ConfigSet`] from a configuration source.
///
/// Both the file-source and store-source loaders implement this trait, so
/// the reload orchestrator can be generic over the configuration source
/// selector from spec §6.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// Load the current state of databases, queries, and endpoints.
    ///
    /// Returns [`CordalError::EmptyConfiguration`] if any of the three kinds
    /// is empty, [`CordalError::DuplicateName`] on a same-kind name
    /// collision, or [`CordalError::ParseError`] on malformed input.
    async fn load(&self) -> Result<ConfigSet>;
}

#[async_trait]
impl ConfigLoader for Box<dyn ConfigLoader> {
    async fn load(&self) -> Result<ConfigSet> {
        (**self).load().await
    }
}

fn reject_if_empty(config: &ConfigSet) -> Result<()> {
    if config.databases.is_empty() {
        return Err(CordalError::EmptyConfiguration { kind: "databases" });
    }
    if config.queries.is_empty() {
        return Err(CordalError::EmptyConfiguration { kind: "queries" });
    }
    if config.endpoints.is_empty() {
        return Err(CordalError::EmptyConfiguration { kind: "endpoints" });
    }
    Ok(())
}
