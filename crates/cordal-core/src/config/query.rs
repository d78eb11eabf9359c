//! `QueryDefinition`: a named parameterized SQL statement.

use serde::{Deserialize, Serialize};

/// Scalar type a query parameter coerces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScalarType {
    /// UTF-8 string, passed through unchanged.
    String,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 64-bit floating point.
    Double,
    /// Boolean, accepting `"true"`/`"false"` (case-insensitive) from string sources.
    Bool,
    /// RFC 3339 / ISO-8601 timestamp.
    Timestamp,
}

/// Where a query parameter's value is read from on an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamSource {
    /// A `{var}` segment of the endpoint's path template.
    Path,
    /// The URL query string.
    Query,
    /// A field of the parsed JSON request body.
    Body,
}

/// One positional parameter of a [`QueryDefinition`], bound to its `?` in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    /// Parameter name, matched against path variables and query/body field names.
    pub name: String,
    /// Declared scalar type, used for coercion.
    pub scalar_type: ScalarType,
    /// `true` if the request must supply this parameter when no default exists.
    #[serde(default = "QueryParameter::default_required")]
    pub required: bool,
    /// Value used when the request omits this parameter and `required` is false.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Where this parameter's value is sourced from on a request.
    pub source: ParamSource,
}

impl QueryParameter {
    const fn default_required() -> bool {
        true
    }
}

/// A named SQL statement bound to one [`super::DatabaseDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Unique name, referenced by endpoints as `queryName`/`countQueryName`.
    pub name: String,
    /// FK to `DatabaseDefinition::name`.
    pub database_name: String,
    /// SQL text with positional `?` placeholders.
    pub sql: String,
    /// Parameters in the order they bind to `?` placeholders.
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
    /// Per-query execution timeout; default 30s per spec §5.
    #[serde(default = "QueryDefinition::default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Free-text description, surfaced in config introspection endpoints.
    #[serde(default)]
    pub description: Option<String>,
}

impl QueryDefinition {
    const fn default_timeout_seconds() -> u64 {
        30
    }

    /// Count of `?` placeholders in `sql`, ignoring those inside single-quoted string
    /// literals so a literal `'?'` in the SQL text is not mistaken for a bind site.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut in_string = false;
        let mut chars = self.sql.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\'' => in_string = !in_string,
                '?' if !in_string => count += 1,
                _ => {}
            }
        }
        count
    }

    /// `true` if the declared parameter count matches the SQL placeholder count,
    /// per spec §3's arity invariant.
    #[must_use]
    pub fn has_matching_arity(&self) -> bool {
        self.placeholder_count() == self.parameters.len()
    }

    /// Names of parameters sourced from the path, in declaration order.
    #[must_use]
    pub fn path_parameter_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.source == ParamSource::Path)
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, source: ParamSource) -> QueryParameter {
        QueryParameter {
            name: name.to_string(),
            scalar_type: ScalarType::String,
            required: true,
            default_value: None,
            source,
        }
    }

    #[test]
    fn placeholder_count_ignores_literal_question_marks() {
        let q = QueryDefinition {
            name: "q".into(),
            database_name: "db".into(),
            sql: "SELECT * FROM t WHERE a = ? AND b = '??'".into(),
            parameters: vec![param("a", ParamSource::Query)],
            timeout_seconds: 30,
            description: None,
        };
        assert_eq!(q.placeholder_count(), 1);
        assert!(q.has_matching_arity());
    }

    #[test]
    fn arity_mismatch_is_detected() {
        let q = QueryDefinition {
            name: "q".into(),
            database_name: "db".into(),
            sql: "SELECT * FROM t WHERE a = ? AND b = ?".into(),
            parameters: vec![param("a", ParamSource::Query)],
            timeout_seconds: 30,
            description: None,
        };
        assert!(!q.has_matching_arity());
    }

    #[test]
    fn path_parameter_names_filters_by_source() {
        let q = QueryDefinition {
            name: "q".into(),
            database_name: "db".into(),
            sql: "SELECT * FROM t WHERE id = ?".into(),
            parameters: vec![param("id", ParamSource::Path), param("x", ParamSource::Query)],
            timeout_seconds: 30,
            description: None,
        };
        assert_eq!(q.path_parameter_names(), vec!["id"]);
    }
}
