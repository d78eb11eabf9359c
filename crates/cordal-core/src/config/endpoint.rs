//! `EndpointDefinition`: a declared HTTP route bound to a query.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP method an endpoint is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// The method name as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Pagination behavior for an endpoint whose query supports `LIMIT`/`OFFSET`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationSpec {
    /// Whether pagination is active for this endpoint.
    #[serde(default)]
    pub enabled: bool,
    /// Page size used when the request omits `size`.
    #[serde(default = "PaginationSpec::default_size")]
    pub default_size: u32,
    /// Upper bound `size` is clamped to.
    #[serde(default = "PaginationSpec::default_max_size")]
    pub max_size: u32,
}

impl PaginationSpec {
    const fn default_size() -> u32 {
        20
    }

    const fn default_max_size() -> u32 {
        100
    }
}

impl Default for PaginationSpec {
    fn default() -> Self {
        Self {
            enabled:      false,
            default_size: Self::default_size(),
            max_size:     Self::default_max_size(),
        }
    }
}

/// Per-endpoint cache participation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Whether responses from this endpoint are cached.
    #[serde(default)]
    pub enabled: bool,
    /// Name of the named cache (see `cordal_core::cache`) to store into.
    pub cache_name: String,
    /// Entry TTL in seconds.
    #[serde(default = "CacheSpec::default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Cache key template with `{var}` substitution; falls back to a
    /// deterministic `queryName:paramName=value&...` key when absent.
    #[serde(default)]
    pub key_pattern: Option<String>,
}

impl CacheSpec {
    const fn default_ttl_seconds() -> u64 {
        60
    }
}

/// How the dispatcher shapes a query's result rows into the JSON response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseShape {
    /// Wrap the result array in an object, e.g. `{ "data": [...] }`, instead of
    /// returning a bare array.
    #[serde(default)]
    pub wrap: bool,
    /// Renames applied to result columns before serialization, `column -> field`.
    #[serde(default)]
    pub field_map: HashMap<String, String>,
}

/// A declared HTTP route bound to one query (and optionally a count query for pagination).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    /// Unique name, used for introspection and metrics keys.
    pub name: String,
    /// URL template, e.g. `/api/users/{id}`.
    pub path: String,
    /// HTTP method this endpoint answers.
    pub method: HttpMethod,
    /// FK to `QueryDefinition::name` providing the primary result set.
    pub query_name: String,
    /// FK to `QueryDefinition::name` providing the row count, required when `pagination.enabled`.
    #[serde(default)]
    pub count_query_name: Option<String>,
    /// Pagination behavior, if any.
    #[serde(default)]
    pub pagination: Option<PaginationSpec>,
    /// Caching behavior, if any.
    #[serde(default)]
    pub cache: Option<CacheSpec>,
    /// Response shaping rules.
    #[serde(default)]
    pub response_shape: Option<ResponseShape>,
    /// Free-text description, surfaced in config introspection endpoints.
    #[serde(default)]
    pub description: Option<String>,
}

impl EndpointDefinition {
    /// `true` if pagination is configured and enabled.
    #[must_use]
    pub fn is_paginated(&self) -> bool {
        self.pagination.as_ref().is_some_and(|p| p.enabled)
    }

    /// `true` if caching is configured and enabled.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.as_ref().is_some_and(|c| c.enabled)
    }

    /// Names of `{var}` path segments in `path`, in left-to-right order.
    #[must_use]
    pub fn path_variables(&self) -> Vec<&str> {
        self.path
            .split('/')
            .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
            .collect()
    }
}
