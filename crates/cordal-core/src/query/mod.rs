//! Query Executor (C4): binds typed parameters to a named SQL statement and executes it.

mod executor;
mod params;

pub use executor::{QueryExecutor, ResultRow, ResultRows};
pub use params::{coerce, BoundValue, OrderedParams};
