//! Typed parameter coercion and ordered binding, per spec §4.4.

use crate::config::{QueryDefinition, QueryParameter, ScalarType};
use chrono::{DateTime, Utc};
use cordal_error::{CordalError, Result};
use tokio_postgres::types::{ToSql, Type};

/// A single coerced query parameter, preserving its scalar type for the wire
/// protocol. Mirrors the teacher's `QueryParam` wrapper in `db::types`,
/// narrowed to the scalar set this spec declares.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// SQL NULL.
    Null,
    /// `ScalarType::String`.
    String(String),
    /// `ScalarType::Int`.
    Int(i32),
    /// `ScalarType::Long`.
    Long(i64),
    /// `ScalarType::Double`.
    Double(f64),
    /// `ScalarType::Bool`.
    Bool(bool),
    /// `ScalarType::Timestamp`.
    Timestamp(DateTime<Utc>),
}

impl ToSql for BoundValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> std::result::Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>>
    {
        match self {
            Self::Null => Ok(tokio_postgres::types::IsNull::Yes),
            Self::String(v) => v.to_sql(ty, out),
            Self::Int(v) => v.to_sql(ty, out),
            Self::Long(v) => v.to_sql(ty, out),
            Self::Double(v) => v.to_sql(ty, out),
            Self::Bool(v) => v.to_sql(ty, out),
            Self::Timestamp(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// Parameters bound in declared order, ready to pass to the executor.
pub type OrderedParams = Vec<BoundValue>;

/// Coerce a raw string value (from a path segment, query-string value, or
/// JSON body field rendered to text) into a [`BoundValue`] per `param`'s
/// declared [`ScalarType`].
///
/// # Errors
/// Returns [`CordalError::BadRequest`] if `raw` cannot be parsed as the
/// declared type.
pub fn coerce(param: &QueryParameter, raw: &str) -> Result<BoundValue> {
    match param.scalar_type {
        ScalarType::String => Ok(BoundValue::String(raw.to_string())),
        ScalarType::Int => raw
            .parse::<i32>()
            .map(BoundValue::Int)
            .map_err(|_| bad_request(param, raw)),
        ScalarType::Long => raw
            .parse::<i64>()
            .map(BoundValue::Long)
            .map_err(|_| bad_request(param, raw)),
        ScalarType::Double => raw
            .parse::<f64>()
            .map(BoundValue::Double)
            .map_err(|_| bad_request(param, raw)),
        ScalarType::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(BoundValue::Bool(true)),
            "false" => Ok(BoundValue::Bool(false)),
            _ => Err(bad_request(param, raw)),
        },
        ScalarType::Timestamp => DateTime::parse_from_rfc3339(raw)
            .map(|dt| BoundValue::Timestamp(dt.with_timezone(&Utc)))
            .map_err(|_| bad_request(param, raw)),
    }
}

fn bad_request(param: &QueryParameter, raw: &str) -> CordalError {
    CordalError::BadRequest {
        message: format!(
            "parameter '{}' expected {:?}, got '{raw}'",
            param.name, param.scalar_type
        ),
    }
}

/// Resolve a raw value for each of `query`'s declared parameters using
/// `lookup`, applying defaults and coercion, in declared order — never URL
/// order, per spec §4.4.
///
/// # Errors
/// Returns [`CordalError::MissingParameter`] when a required parameter has
/// no value and no default, or a coercion error from [`coerce`].
pub fn bind_ordered<F>(query: &QueryDefinition, mut lookup: F) -> Result<OrderedParams>
where
    F: FnMut(&QueryParameter) -> Option<String>,
{
    let mut bound = Vec::with_capacity(query.parameters.len());
    for param in &query.parameters {
        let raw = lookup(param).or_else(|| param.default_value.clone());
        match raw {
            Some(value) => bound.push(coerce(param, &value)?),
            None if param.required => {
                return Err(CordalError::MissingParameter {
                    name: param.name.clone(),
                })
            }
            None => bound.push(BoundValue::Null),
        }
    }
    Ok(bound)
}
