//! Binds parameters to a `QueryDefinition` and executes it against a pooled connection.

use super::params::{BoundValue, OrderedParams};
use crate::config::QueryDefinition;
use crate::pool::PoolManager;
use cordal_error::{CordalError, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// One result row, in statement column order.
pub type ResultRow = Vec<(String, Value)>;
/// A query's full result set.
pub type ResultRows = Vec<ResultRow>;

/// Executes named queries against pools owned by a [`PoolManager`].
///
/// Exposes no `tokio_postgres` types to callers: driver errors are mapped
/// to [`CordalError::QueryFailed`] / [`CordalError::DatabaseUnavailable`],
/// matching the teacher's boundary in `db::postgres::adapter`.
pub struct QueryExecutor {
    pools: Arc<PoolManager>,
}

impl QueryExecutor {
    /// Build an executor over `pools`.
    #[must_use]
    pub const fn new(pools: Arc<PoolManager>) -> Self {
        Self { pools }
    }

    /// Execute `query` with `params` bound in declared order, returning rows
    /// as an ordered sequence of `(column_name, value)` pairs, preserving
    /// statement column order.
    ///
    /// # Errors
    /// [`CordalError::DatabaseUnavailable`] if no connection can be
    /// acquired; [`CordalError::QueryFailed`] if the statement fails or
    /// times out.
    pub async fn execute(&self, query: &QueryDefinition, params: &OrderedParams) -> Result<ResultRows> {
        self.run(&query.sql, query, params).await
    }

    /// Execute `query` as a paginated data query: appends a single `LIMIT ?
    /// OFFSET ?` fragment to `query.sql` and binds `limit`/`offset` as
    /// trailing parameters after `params`, per spec §9's SQL-safety note.
    /// The validator rejects endpoints whose SQL already declares its own
    /// `LIMIT`/`OFFSET`, so this never produces a duplicate clause.
    ///
    /// # Errors
    /// Same as [`Self::execute`].
    pub async fn execute_paginated(
        &self,
        query: &QueryDefinition,
        params: &OrderedParams,
        limit: i64,
        offset: i64,
    ) -> Result<ResultRows> {
        let sql = format!("{} LIMIT ? OFFSET ?", query.sql);
        let mut bound = params.clone();
        bound.push(BoundValue::Long(limit));
        bound.push(BoundValue::Long(offset));
        self.run(&sql, query, &bound).await
    }

    async fn run(&self, sql: &str, query: &QueryDefinition, params: &OrderedParams) -> Result<ResultRows> {
        let pool = self.pools.data_source(&query.database_name)?;
        let client = pool.get().await.map_err(|e| CordalError::DatabaseUnavailable {
            database: query.database_name.clone(),
            message:  e.to_string(),
        })?;

        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn tokio_postgres::types::ToSql + Sync)).collect();

        let run = client.query(sql, &refs);
        let rows = timeout(Duration::from_secs(query.timeout_seconds), run)
            .await
            .map_err(|_| CordalError::QueryFailed {
                query:   query.name.clone(),
                message: format!("timed out after {}s", query.timeout_seconds),
            })?
            .map_err(|e| CordalError::QueryFailed {
                query:   query.name.clone(),
                message: e.to_string(),
            })?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut mapped = Vec::with_capacity(row.columns().len());
            for (idx, column) in row.columns().iter().enumerate() {
                let value = column_to_json(row, idx);
                mapped.push((column.name().to_string(), value));
            }
            out.push(mapped);
        }
        Ok(out)
    }

    /// Execute `query`, expecting a single row with a single numeric
    /// column, and return it as `i64`. Used for the paired count query of
    /// a paginated endpoint.
    ///
    /// # Errors
    /// [`CordalError::QueryFailed`] if the result is not exactly one row
    /// with one numeric column.
    pub async fn execute_count(&self, query: &QueryDefinition, params: &OrderedParams) -> Result<i64> {
        let rows = self.execute(query, params).await?;
        let row = rows.first().ok_or_else(|| CordalError::QueryFailed {
            query:   query.name.clone(),
            message: "count query returned no rows".to_string(),
        })?;
        let (_, value) = row.first().ok_or_else(|| CordalError::QueryFailed {
            query:   query.name.clone(),
            message: "count query returned no columns".to_string(),
        })?;
        value.as_i64().ok_or_else(|| CordalError::QueryFailed {
            query:   query.name.clone(),
            message: "count query's first column is not numeric".to_string(),
        })
    }
}

fn column_to_json(row: &tokio_postgres::Row, idx: usize) -> Value {
    use tokio_postgres::types::Type;

    let ty = row.columns()[idx].type_();
    match *ty {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Bool),
        Type::INT2 | Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::from(v)),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::from),
        Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<Value>>(idx)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        Type::TIMESTAMP | Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::String(v.to_rfc3339())),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::String),
    }
}
