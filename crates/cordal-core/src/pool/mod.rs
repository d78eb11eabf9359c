//! Connection-Pool Manager (C3): one pooled data source per named backend database.

mod manager;

pub use manager::{PoolManager, PoolMetrics};
