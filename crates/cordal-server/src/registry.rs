//! Endpoint Registry (C7): the live, atomically replaceable routing table.

use arc_swap::ArcSwap;
use cordal_core::config::{EndpointDefinition, HttpMethod};
use std::sync::Arc;

/// One path segment of a compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// A fixed literal segment, matched exactly.
    Literal(String),
    /// A `{var}` segment, bound to the matching request path component.
    Variable(String),
}

/// A [`EndpointDefinition`] compiled into a matcher, ready for dispatch.
#[derive(Debug, Clone)]
pub struct CompiledEndpoint {
    /// The source definition this was compiled from.
    pub definition: EndpointDefinition,
    segments: Vec<Segment>,
}

impl CompiledEndpoint {
    fn compile(definition: EndpointDefinition) -> Self {
        let segments = definition
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|seg| {
                seg.strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                    .map_or_else(|| Segment::Literal(seg.to_string()), |var| Segment::Variable(var.to_string()))
            })
            .collect();
        Self { definition, segments }
    }

    /// Number of literal (non-variable) segments, used as the specificity key.
    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// If `path` matches this endpoint's template, return the extracted path variables.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let request_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if request_segments.len() != self.segments.len() {
            return None;
        }
        let mut vars = Vec::new();
        for (template, actual) in self.segments.iter().zip(request_segments.iter()) {
            match template {
                Segment::Literal(lit) if lit == actual => {}
                Segment::Literal(_) => return None,
                Segment::Variable(name) => vars.push((name.clone(), (*actual).to_string())),
            }
        }
        Some(vars)
    }
}

/// The live mapping from (method, path-template) to compiled endpoint,
/// swapped whole under an [`ArcSwap`] so dispatch never blocks on reload.
///
/// Grounded on the teacher's declared-but-unused `arc-swap` dependency
/// (brought in for exactly this wait-free-read/single-writer pattern);
/// CORDAL is its first real consumer.
pub struct EndpointRegistry {
    live: ArcSwap<Vec<CompiledEndpoint>>,
}

impl EndpointRegistry {
    /// Build a registry from `endpoints`, pre-sorted by specificity.
    #[must_use]
    pub fn new(endpoints: Vec<EndpointDefinition>) -> Self {
        Self {
            live: ArcSwap::from_pointee(Self::compile_sorted(endpoints)),
        }
    }

    fn compile_sorted(endpoints: Vec<EndpointDefinition>) -> Vec<CompiledEndpoint> {
        let mut compiled: Vec<CompiledEndpoint> = endpoints.into_iter().map(CompiledEndpoint::compile).collect();
        // Stable sort: more literal segments first; ties keep declaration order,
        // matching spec §4.7's "more specific paths match before wildcard ones".
        compiled.sort_by(|a, b| b.literal_count().cmp(&a.literal_count()));
        compiled
    }

    /// Atomically replace the live endpoint set. In-flight lookups that
    /// already loaded the previous `Arc` complete against it; new lookups
    /// see the new set.
    pub fn swap(&self, endpoints: Vec<EndpointDefinition>) {
        self.live.store(Arc::new(Self::compile_sorted(endpoints)));
    }

    /// Find the first endpoint (in specificity order) whose method and path
    /// template match the request.
    #[must_use]
    pub fn resolve(&self, method: HttpMethod, path: &str) -> Option<(CompiledEndpoint, Vec<(String, String)>)> {
        let snapshot = self.live.load();
        for endpoint in snapshot.iter() {
            if endpoint.definition.method != method {
                continue;
            }
            if let Some(vars) = endpoint.matches(path) {
                return Some((endpoint.clone(), vars));
            }
        }
        None
    }

    /// Every currently-live endpoint definition, for the
    /// `/api/generic/endpoints` introspection surface.
    #[must_use]
    pub fn list(&self) -> Vec<EndpointDefinition> {
        self.live.load().iter().map(|e| e.definition.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str, path: &str, method: HttpMethod) -> EndpointDefinition {
        EndpointDefinition {
            name: name.to_string(),
            path: path.to_string(),
            method,
            query_name: name.to_string(),
            count_query_name: None,
            pagination: None,
            cache: None,
            response_shape: None,
            description: None,
        }
    }

    #[test]
    fn more_specific_path_wins_over_wildcard() {
        let registry = EndpointRegistry::new(vec![
            endpoint("by_id", "/api/stock-trades/{id}", HttpMethod::Get),
            endpoint("date_range", "/api/stock-trades/date-range", HttpMethod::Get),
        ]);

        let (matched, _) = registry
            .resolve(HttpMethod::Get, "/api/stock-trades/date-range")
            .unwrap();
        assert_eq!(matched.definition.name, "date_range");
    }

    #[test]
    fn variable_segment_is_extracted() {
        let registry = EndpointRegistry::new(vec![endpoint("by_id", "/api/users/{id}", HttpMethod::Get)]);
        let (_, vars) = registry.resolve(HttpMethod::Get, "/api/users/42").unwrap();
        assert_eq!(vars, vec![("id".to_string(), "42".to_string())]);
    }

    #[test]
    fn no_match_returns_none() {
        let registry = EndpointRegistry::new(vec![endpoint("by_id", "/api/users/{id}", HttpMethod::Get)]);
        assert!(registry.resolve(HttpMethod::Post, "/api/users/42").is_none());
    }

    #[test]
    fn swap_replaces_live_set_atomically() {
        let registry = EndpointRegistry::new(vec![endpoint("a", "/api/a", HttpMethod::Get)]);
        assert!(registry.resolve(HttpMethod::Get, "/api/a").is_some());
        registry.swap(vec![endpoint("b", "/api/b", HttpMethod::Get)]);
        assert!(registry.resolve(HttpMethod::Get, "/api/a").is_none());
        assert!(registry.resolve(HttpMethod::Get, "/api/b").is_some());
    }
}
