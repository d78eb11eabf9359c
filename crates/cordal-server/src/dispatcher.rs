//! Request Dispatcher (C8): resolves an inbound request against the live
//! registry, binds parameters, executes the query, and shapes the response.
//!
//! Grounded on the teacher's `fraiseql-cli` request-to-response pipeline
//! idea (resolve → bind → execute → shape), rewritten here around the
//! config-driven `EndpointDefinition` rather than a GraphQL document.

use crate::registry::EndpointRegistry;
use cordal_core::cache::CacheRegistry;
use cordal_core::config::{CacheSpec, EndpointDefinition, HttpMethod, ParamSource, QueryDefinition, ResponseShape};
use cordal_core::query::{bind_ordered, OrderedParams, QueryExecutor, ResultRows};
use cordal_error::{CordalError, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Inbound request facts the dispatcher needs, already parsed out of the
/// HTTP layer by the route handler.
pub struct RequestContext<'a> {
    /// HTTP method of the inbound request.
    pub method: HttpMethod,
    /// Request path, e.g. `/api/users/42`.
    pub path: &'a str,
    /// Parsed query-string parameters.
    pub query: &'a HashMap<String, String>,
    /// Parsed JSON body, if the request carried one.
    pub body: Option<&'a Value>,
}

/// A successfully dispatched response: the JSON body and whether it was served from cache.
pub struct DispatchResponse {
    /// The response body.
    pub body: Value,
    /// `true` if this response was served from the endpoint's cache without running a query.
    pub from_cache: bool,
}

/// Everything the dispatcher needs to resolve and answer one request.
pub struct Dispatcher<'a> {
    /// C7 — the live routing table.
    pub registry: &'a EndpointRegistry,
    /// C4 — executes named queries.
    pub executor: &'a QueryExecutor,
    /// C5 — named response caches.
    pub caches: &'a CacheRegistry,
    /// The queries referenced by `registry`'s live endpoints, keyed by name.
    pub queries: &'a HashMap<String, QueryDefinition>,
}

impl Dispatcher<'_> {
    /// Resolve, execute, and shape a response for `ctx`.
    ///
    /// # Errors
    /// [`CordalError::NotFound`] if no live endpoint matches; otherwise any
    /// error surfaced by parameter binding or query execution.
    pub async fn dispatch(&self, ctx: &RequestContext<'_>) -> Result<DispatchResponse> {
        let (endpoint, path_vars) = self
            .registry
            .resolve(ctx.method, ctx.path)
            .ok_or_else(|| CordalError::NotFound {
                message: format!("no endpoint matches {} {}", ctx.method.as_str(), ctx.path),
            })?;

        let query = self
            .queries
            .get(&endpoint.definition.query_name)
            .ok_or_else(|| CordalError::NotFound {
                message: format!("query '{}' is not live", endpoint.definition.query_name),
            })?;

        let pagination = endpoint.definition.pagination.as_ref().filter(|p| p.enabled);
        let page_request = pagination.map(|p| PageRequest::from_query(ctx.query, p.default_size, p.max_size));

        let path_lookup: HashMap<&str, &str> =
            path_vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        let cache_spec = endpoint.definition.cache.as_ref().filter(|c| c.enabled);
        let cache = cache_spec.map(|spec| self.caches.get_or_create_default(&spec.cache_name));
        let cache_key = cache_spec.map(|spec| {
            cache_key_for(
                spec,
                &endpoint.definition,
                &path_lookup,
                ctx.query,
                ctx.body,
            )
        });

        if let (Some(cache), Some(key)) = (&cache, &cache_key) {
            if let Some(value) = cache.get(key) {
                return Ok(DispatchResponse {
                    body: value,
                    from_cache: true,
                });
            }
        }

        let params = bind_ordered(query, |param| {
            resolve_param(param.name.as_str(), param.source, &path_lookup, ctx.query, ctx.body)
        })?;

        let body = if let Some(page) = &page_request {
            let count_name = endpoint.definition.count_query_name.as_ref().ok_or_else(|| {
                CordalError::ConfigInvalid {
                    message: format!("paginated endpoint '{}' has no countQueryName", endpoint.definition.name),
                }
            })?;
            let count_query = self
                .queries
                .get(count_name)
                .ok_or_else(|| CordalError::NotFound {
                    message: format!("count query '{count_name}' is not live"),
                })?;
            let count_params: OrderedParams = bind_ordered(count_query, |param| {
                resolve_param(param.name.as_str(), param.source, &path_lookup, ctx.query, ctx.body)
            })?;
            let total_elements = self.executor.execute_count(count_query, &count_params).await?;

            let rows = self
                .executor
                .execute_paginated(query, &params, i64::from(page.size), page.offset())
                .await?;
            let shaped_rows = shape_rows(rows, endpoint.definition.response_shape.as_ref());
            envelope_for_page(shaped_rows, page, total_elements)
        } else {
            let rows = self.executor.execute(query, &params).await?;
            let shaped_rows = shape_rows(rows, endpoint.definition.response_shape.as_ref());
            Value::Array(shaped_rows)
        };

        if let (Some(cache), Some(key), Some(spec)) = (&cache, &cache_key, cache_spec) {
            cache.put(key, body.clone(), Some(Duration::from_secs(spec.ttl_seconds)));
        }

        Ok(DispatchResponse {
            body,
            from_cache: false,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    fn from_query(query: &HashMap<String, String>, default_size: u32, max_size: u32) -> Self {
        let page = query.get("page").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
        let size = query
            .get("size")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default_size)
            .clamp(1, max_size.max(1));
        Self { page, size }
    }

    const fn offset(&self) -> i64 {
        (self.page as i64) * (self.size as i64)
    }
}

fn resolve_param(
    name: &str,
    source: ParamSource,
    path_vars: &HashMap<&str, &str>,
    query: &HashMap<String, String>,
    body: Option<&Value>,
) -> Option<String> {
    match source {
        ParamSource::Path => path_vars.get(name).map(|v| (*v).to_string()),
        ParamSource::Query => query.get(name).cloned(),
        ParamSource::Body => body.and_then(|b| b.get(name)).and_then(json_scalar_to_raw),
    }
}

fn json_scalar_to_raw(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn cache_key_for(
    spec: &CacheSpec,
    endpoint: &EndpointDefinition,
    path_vars: &HashMap<&str, &str>,
    query: &HashMap<String, String>,
    body: Option<&Value>,
) -> String {
    if let Some(pattern) = &spec.key_pattern {
        return substitute_key_pattern(pattern, path_vars, query, body);
    }
    let mut parts: Vec<(String, String)> = path_vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .chain(query.iter().map(|(k, v)| (k.clone(), v.clone())))
        .collect();
    parts.sort_by(|a, b| a.0.cmp(&b.0));
    let joined = parts
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}:{joined}", endpoint.query_name)
}

fn substitute_key_pattern(
    pattern: &str,
    path_vars: &HashMap<&str, &str>,
    query: &HashMap<String, String>,
    body: Option<&Value>,
) -> String {
    let mut out = String::with_capacity(pattern.len());
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = pattern[i..].find('}') {
                let name = &pattern[i + 1..i + end];
                let value = path_vars
                    .get(name)
                    .map(|v| (*v).to_string())
                    .or_else(|| query.get(name).cloned())
                    .or_else(|| body.and_then(|b| b.get(name)).and_then(json_scalar_to_raw))
                    .unwrap_or_default();
                out.push_str(&value);
                i += end + 1;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn shape_rows(rows: ResultRows, shape: Option<&ResponseShape>) -> Vec<Value> {
    rows.into_iter()
        .map(|row| {
            let mut object = Map::with_capacity(row.len());
            for (column, value) in row {
                let field = shape
                    .and_then(|s| s.field_map.get(&column))
                    .cloned()
                    .unwrap_or(column);
                object.insert(field, value);
            }
            Value::Object(object)
        })
        .collect()
}

fn envelope_for_page(data: Vec<Value>, page: &PageRequest, total_elements: i64) -> Value {
    let size = i64::from(page.size).max(1);
    let total_pages = (total_elements + size - 1) / size;
    json!({
        "data": data,
        "page": page.page,
        "size": page.size,
        "totalElements": total_elements,
        "totalPages": total_pages.max(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_size_to_max() {
        let mut query = HashMap::new();
        query.insert("size".to_string(), "500".to_string());
        let page = PageRequest::from_query(&query, 20, 100);
        assert_eq!(page.size, 100);
    }

    #[test]
    fn page_request_defaults_when_absent() {
        let query = HashMap::new();
        let page = PageRequest::from_query(&query, 20, 100);
        assert_eq!(page.page, 0);
        assert_eq!(page.size, 20);
    }

    #[test]
    fn envelope_computes_total_pages() {
        let page = PageRequest { page: 0, size: 10 };
        let body = envelope_for_page(vec![], &page, 25);
        assert_eq!(body["totalPages"], 3);
    }

    #[test]
    fn fallback_cache_key_is_alphabetically_ordered() {
        let endpoint = EndpointDefinition {
            name: "find_user".into(),
            path: "/api/users/{id}".into(),
            method: HttpMethod::Get,
            query_name: "find_user".into(),
            count_query_name: None,
            pagination: None,
            cache: None,
            response_shape: None,
            description: None,
        };
        let mut path_vars = HashMap::new();
        path_vars.insert("id", "7");
        let mut query = HashMap::new();
        query.insert("active".to_string(), "true".to_string());
        let key = cache_key_for(
            &CacheSpec {
                enabled: true,
                cache_name: "c".into(),
                ttl_seconds: 60,
                key_pattern: None,
            },
            &endpoint,
            &path_vars,
            &query,
            None,
        );
        assert_eq!(key, "find_user:active=true&id=7");
    }

    #[test]
    fn key_pattern_substitutes_path_variables() {
        let mut path_vars = HashMap::new();
        path_vars.insert("id", "7");
        let key = substitute_key_pattern("user:{id}:profile", &path_vars, &HashMap::new(), None);
        assert_eq!(key, "user:7:profile");
    }

    #[test]
    fn body_scalar_source_reads_json_field() {
        let body = json!({"name": "ada"});
        let value = resolve_param(
            "name",
            ParamSource::Body,
            &HashMap::new(),
            &HashMap::new(),
            Some(&body),
        );
        assert_eq!(value.as_deref(), Some("ada"));
    }
}
