//! Configuration Validator (C2): checks the endpoint→query→database graph.

use super::{ConfigSet, ParamSource};
use serde::Serialize;
use std::collections::HashSet;

/// Severity of one validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Blocks a configuration from becoming live.
    Error,
    /// Noted but does not block activation (e.g. an unreachable database during the live-schema check).
    Warning,
}

/// One finding produced while validating a [`ConfigSet`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Error or warning.
    pub severity: Severity,
    /// Name of the endpoint/query/database the issue concerns, if any.
    pub subject: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            subject:  Some(subject.into()),
            message:  message.into(),
        }
    }

    fn warning(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            subject:  Some(subject.into()),
            message:  message.into(),
        }
    }
}

/// The outcome of validating one [`ConfigSet`], per spec §4.2.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Findings that block this configuration from going live.
    pub errors: Vec<ValidationIssue>,
    /// Findings that do not block activation.
    pub warnings: Vec<ValidationIssue>,
    /// Names of checks that passed cleanly, for the `/api/generic/config/validate` surface.
    pub successes: Vec<String>,
}

impl ValidationReport {
    /// `true` when no errors were recorded (warnings are permitted).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A probe for whether a database is currently reachable, used to decide
/// whether the live-schema check (spec §4.2 item 6) runs or degrades to a
/// warning. Implemented by `cordal_core::pool::PoolManager`.
pub trait ReachabilityProbe {
    /// `true` if `database_name` can currently be reached.
    fn is_available(&self, database_name: &str) -> bool;
}

/// A probe that reports every database reachable; used where live-schema
/// checking is not wired up (e.g. unit tests for structural validation only).
pub struct AlwaysAvailable;

impl ReachabilityProbe for AlwaysAvailable {
    fn is_available(&self, _database_name: &str) -> bool {
        true
    }
}

/// Run the structural checks of spec §4.2, items 1-5, against `config`.
///
/// Item 6 (live schema check) requires a database connection and is not
/// performed by this function, nor by anything else in this crate: it is
/// not implemented. `ReachabilityProbe` is kept as the seam a future
/// live-schema pass would degrade through (warning, not error, when a
/// database is unreachable), but no caller wires one up today.
#[must_use]
pub fn validate(config: &ConfigSet) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_endpoint_queries_exist(config, &mut report);
    check_paginated_endpoints_have_count_query(config, &mut report);
    check_query_databases_exist(config, &mut report);
    check_query_arity(config, &mut report);
    check_paginated_queries_exclude_limit_offset(config, &mut report);
    check_path_variables_bind_to_query_params(config, &mut report);
    check_no_reference_cycles(config, &mut report);

    report
}

fn check_endpoint_queries_exist(config: &ConfigSet, report: &mut ValidationReport) {
    let mut ok = true;
    for endpoint in config.endpoints.values() {
        if !config.queries.contains_key(&endpoint.query_name) {
            report.errors.push(ValidationIssue::error(
                &endpoint.name,
                format!(
                    "endpoint '{}' references unknown query '{}'",
                    endpoint.name, endpoint.query_name
                ),
            ));
            ok = false;
        }
    }
    if ok {
        report.successes.push("endpoint query references resolve".to_string());
    }
}

fn check_paginated_endpoints_have_count_query(config: &ConfigSet, report: &mut ValidationReport) {
    let mut ok = true;
    for endpoint in config.endpoints.values() {
        if !endpoint.is_paginated() {
            continue;
        }
        match &endpoint.count_query_name {
            None => {
                report.errors.push(ValidationIssue::error(
                    &endpoint.name,
                    format!("paginated endpoint '{}' has no countQueryName", endpoint.name),
                ));
                ok = false;
            }
            Some(count_name) if !config.queries.contains_key(count_name) => {
                report.errors.push(ValidationIssue::error(
                    &endpoint.name,
                    format!(
                        "endpoint '{}' references unknown count query '{}'",
                        endpoint.name, count_name
                    ),
                ));
                ok = false;
            }
            Some(_) => {}
        }
    }
    if ok {
        report
            .successes
            .push("paginated endpoints declare a resolvable count query".to_string());
    }
}

fn check_query_databases_exist(config: &ConfigSet, report: &mut ValidationReport) {
    let mut ok = true;
    for query in config.queries.values() {
        if !config.databases.contains_key(&query.database_name) {
            report.errors.push(ValidationIssue::error(
                &query.name,
                format!(
                    "query '{}' references unknown database '{}'",
                    query.name, query.database_name
                ),
            ));
            ok = false;
        }
    }
    if ok {
        report.successes.push("query database references resolve".to_string());
    }
}

fn check_query_arity(config: &ConfigSet, report: &mut ValidationReport) {
    let mut ok = true;
    for query in config.queries.values() {
        if !query.has_matching_arity() {
            report.errors.push(ValidationIssue::error(
                &query.name,
                format!(
                    "query '{}' has {} placeholder(s) but {} declared parameter(s)",
                    query.name,
                    query.placeholder_count(),
                    query.parameters.len()
                ),
            ));
            ok = false;
        }
    }
    if ok {
        report.successes.push("query parameter arity matches SQL placeholders".to_string());
    }
}

/// The executor appends a single `LIMIT ? OFFSET ?` fragment to a paginated
/// endpoint's query and binds page size/offset as trailing parameters, per
/// spec §9's SQL-safety note; a query that already hand-writes `LIMIT`/
/// `OFFSET` would end up with two of each, so paginated endpoints reject
/// the combination here instead.
fn check_paginated_queries_exclude_limit_offset(config: &ConfigSet, report: &mut ValidationReport) {
    let mut ok = true;
    for endpoint in config.endpoints.values() {
        if !endpoint.is_paginated() {
            continue;
        }
        let Some(query) = config.queries.get(&endpoint.query_name) else {
            continue;
        };
        if contains_limit_or_offset(&query.sql) {
            report.errors.push(ValidationIssue::error(
                &query.name,
                format!(
                    "query '{}' is used by paginated endpoint '{}' but already contains LIMIT/OFFSET",
                    query.name, endpoint.name
                ),
            ));
            ok = false;
        }
    }
    if ok {
        report
            .successes
            .push("paginated endpoint queries do not already contain LIMIT/OFFSET".to_string());
    }
}

fn contains_limit_or_offset(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    upper.contains("LIMIT") || upper.contains("OFFSET")
}

fn check_path_variables_bind_to_query_params(config: &ConfigSet, report: &mut ValidationReport) {
    let mut ok = true;
    for endpoint in config.endpoints.values() {
        let Some(query) = config.queries.get(&endpoint.query_name) else {
            continue;
        };
        let path_params: HashSet<&str> = query
            .parameters
            .iter()
            .filter(|p| p.source == ParamSource::Path)
            .map(|p| p.name.as_str())
            .collect();
        for var in endpoint.path_variables() {
            if !path_params.contains(var) {
                report.errors.push(ValidationIssue::error(
                    &endpoint.name,
                    format!(
                        "endpoint '{}' path variable '{{{}}}' has no matching PATH parameter on query '{}'",
                        endpoint.name, var, endpoint.query_name
                    ),
                ));
                ok = false;
            }
        }
    }
    if ok {
        report
            .successes
            .push("endpoint path variables bind to PATH-sourced query parameters".to_string());
    }
}

/// Endpoint→Query→Database is a DAG by construction in this data model (an
/// endpoint cannot reference another endpoint, nor a query another query),
/// so a cycle can only arise from a hand-edited store row that reuses a
/// query's own name as its `database_name`, or similar degenerate self-reference.
fn check_no_reference_cycles(config: &ConfigSet, report: &mut ValidationReport) {
    let mut ok = true;
    for query in config.queries.values() {
        if query.name == query.database_name {
            report.errors.push(ValidationIssue::error(
                &query.name,
                format!("query '{}' names itself as its own database", query.name),
            ));
            ok = false;
        }
    }
    if ok {
        report.successes.push("no reference cycles detected".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CacheSpec, DatabaseDefinition, EndpointDefinition, HttpMethod as Method, ParamSource,
        PoolParameters, QueryDefinition, QueryParameter, ScalarType,
    };
    use std::collections::HashMap;

    fn sample_config() -> ConfigSet {
        let mut databases = HashMap::new();
        databases.insert(
            "primary".to_string(),
            DatabaseDefinition {
                name: "primary".into(),
                url: "postgres://localhost/test".into(),
                driver: "postgresql".into(),
                username: None,
                password: None,
                pool: PoolParameters::default(),
                description: None,
            },
        );

        let mut queries = HashMap::new();
        queries.insert(
            "find_user".to_string(),
            QueryDefinition {
                name: "find_user".into(),
                database_name: "primary".into(),
                sql: "SELECT * FROM users WHERE id = ?".into(),
                parameters: vec![QueryParameter {
                    name: "id".into(),
                    scalar_type: ScalarType::Long,
                    required: true,
                    default_value: None,
                    source: ParamSource::Path,
                }],
                timeout_seconds: 30,
                description: None,
            },
        );

        let mut endpoints = HashMap::new();
        endpoints.insert(
            "find_user".to_string(),
            EndpointDefinition {
                name: "find_user".into(),
                path: "/api/users/{id}".into(),
                method: Method::Get,
                query_name: "find_user".into(),
                count_query_name: None,
                pagination: None,
                cache: None,
                response_shape: None,
                description: None,
            },
        );

        ConfigSet {
            databases,
            queries,
            endpoints,
        }
    }

    #[test]
    fn well_formed_config_passes() {
        let report = validate(&sample_config());
        assert!(report.is_valid(), "{report:?}");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_query_is_an_error() {
        let mut config = sample_config();
        config.endpoints.get_mut("find_user").unwrap().query_name = "nope".into();
        let report = validate(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn paginated_endpoint_without_count_query_is_an_error() {
        let mut config = sample_config();
        config.endpoints.get_mut("find_user").unwrap().pagination =
            Some(crate::config::PaginationSpec {
                enabled:      true,
                default_size: 20,
                max_size:     100,
            });
        let report = validate(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let mut config = sample_config();
        config.queries.get_mut("find_user").unwrap().sql =
            "SELECT * FROM users WHERE id = ? AND active = ?".into();
        let report = validate(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn paginated_query_with_existing_limit_is_rejected() {
        let mut config = sample_config();
        config.endpoints.get_mut("find_user").unwrap().pagination = Some(crate::config::PaginationSpec {
            enabled:      true,
            default_size: 20,
            max_size:     100,
        });
        config.endpoints.get_mut("find_user").unwrap().count_query_name = Some("find_user".into());
        config.queries.get_mut("find_user").unwrap().sql = "SELECT * FROM users WHERE id = ? LIMIT 10".into();
        let report = validate(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn unbound_path_variable_is_an_error() {
        let mut config = sample_config();
        config.endpoints.get_mut("find_user").unwrap().path = "/api/users/{id}/{org}".into();
        let report = validate(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn cache_spec_does_not_affect_structural_validation() {
        let mut config = sample_config();
        config.endpoints.get_mut("find_user").unwrap().cache = Some(CacheSpec {
            enabled:     true,
            cache_name:  "users".into(),
            ttl_seconds: 60,
            key_pattern: None,
        });
        assert!(validate(&config).is_valid());
    }
}
