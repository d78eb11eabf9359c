//! Cross-crate scenarios from spec §8 that need the reload orchestrator,
//! the endpoint registry, and the validator wired together.

use async_trait::async_trait;
use cordal_core::config::loader::ConfigLoader;
use cordal_core::config::{
    DatabaseDefinition, EndpointDefinition, HttpMethod, ParamSource, PoolParameters,
    QueryDefinition, QueryParameter, ScalarType,
};
use cordal_core::pool::PoolManager;
use cordal_core::snapshot::SnapshotHistory;
use cordal_core::ConfigSet;
use cordal_error::Result;
use cordal_server::registry::EndpointRegistry;
use cordal_server::reload::{ReloadOrchestrator, ReloadState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn database(name: &str) -> DatabaseDefinition {
    DatabaseDefinition {
        name: name.to_string(),
        url: format!("postgres://localhost/{name}"),
        driver: "postgresql".to_string(),
        username: None,
        password: None,
        pool: PoolParameters::default(),
        description: None,
    }
}

fn query(name: &str, sql: &str, parameters: Vec<QueryParameter>) -> QueryDefinition {
    QueryDefinition {
        name: name.to_string(),
        database_name: "primary".to_string(),
        sql: sql.to_string(),
        parameters,
        timeout_seconds: 30,
        description: None,
    }
}

fn endpoint(name: &str, path: &str) -> EndpointDefinition {
    EndpointDefinition {
        name: name.to_string(),
        path: path.to_string(),
        method: HttpMethod::Get,
        query_name: name.to_string(),
        count_query_name: None,
        pagination: None,
        cache: None,
        response_shape: None,
        description: None,
    }
}

fn id_param() -> QueryParameter {
    QueryParameter {
        name: "id".to_string(),
        scalar_type: ScalarType::Long,
        required: true,
        default_value: None,
        source: ParamSource::Path,
    }
}

/// Returns each config in `revisions` once per call, in order, then repeats the last.
struct SequenceLoader {
    revisions: Vec<ConfigSet>,
    call_count: AtomicUsize,
}

#[async_trait]
impl ConfigLoader for SequenceLoader {
    async fn load(&self) -> Result<ConfigSet> {
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let last = self.revisions.len() - 1;
        Ok(self.revisions[index.min(last)].clone())
    }
}

#[tokio::test]
async fn arity_mismatch_blocks_registry_swap() {
    let mut databases = HashMap::new();
    databases.insert("primary".to_string(), database("primary"));
    let mut queries = HashMap::new();
    // Two `?` placeholders, one declared parameter: invalid per spec §8 scenario 5.
    queries.insert(
        "find_user".to_string(),
        query(
            "find_user",
            "SELECT * FROM users WHERE id = ? AND active = ?",
            vec![id_param()],
        ),
    );
    let mut endpoints = HashMap::new();
    endpoints.insert("find_user".to_string(), endpoint("find_user", "/api/users/{id}"));

    let invalid = ConfigSet {
        databases,
        queries,
        endpoints,
    };

    let loader = SequenceLoader {
        revisions: vec![invalid],
        call_count: AtomicUsize::new(0),
    };
    let registry = Arc::new(EndpointRegistry::new(Vec::new()));
    let orchestrator = ReloadOrchestrator::new(
        loader,
        Arc::new(PoolManager::new()),
        registry.clone(),
        Arc::new(SnapshotHistory::new(10)),
        2,
    );

    let outcome = orchestrator.trigger().await;
    assert_eq!(outcome.state, ReloadState::Failed);
    assert!(registry.list().is_empty(), "registry must not swap on a CONFIG_INVALID reload");
}

#[tokio::test]
async fn hot_reload_swaps_endpoints_without_disrupting_in_flight_lookups() {
    let mut databases = HashMap::new();
    databases.insert("primary".to_string(), database("primary"));

    let mut queries_v1 = HashMap::new();
    queries_v1.insert("by_id".to_string(), query("by_id", "SELECT * FROM users WHERE id = ?", vec![id_param()]));
    let mut endpoints_v1 = HashMap::new();
    endpoints_v1.insert("by_id".to_string(), endpoint("by_id", "/api/users/{id}"));
    let v1 = ConfigSet {
        databases: databases.clone(),
        queries: queries_v1,
        endpoints: endpoints_v1,
    };

    let mut queries_v2 = HashMap::new();
    queries_v2.insert(
        "by_email".to_string(),
        query("by_email", "SELECT * FROM users WHERE email = ?", vec![QueryParameter {
            name: "email".to_string(),
            scalar_type: ScalarType::String,
            required: true,
            default_value: None,
            source: ParamSource::Path,
        }]),
    );
    let mut endpoints_v2 = HashMap::new();
    endpoints_v2.insert("by_email".to_string(), endpoint("by_email", "/api/users/by-email/{email}"));
    let v2 = ConfigSet {
        databases,
        queries: queries_v2,
        endpoints: endpoints_v2,
    };

    let loader = SequenceLoader {
        revisions: vec![v1, v2],
        call_count: AtomicUsize::new(0),
    };
    let registry = Arc::new(EndpointRegistry::new(Vec::new()));
    let orchestrator = Arc::new(ReloadOrchestrator::new(
        loader,
        Arc::new(PoolManager::new()),
        registry.clone(),
        Arc::new(SnapshotHistory::new(10)),
        2,
    ));

    let first = orchestrator.trigger().await;
    assert_eq!(first.state, ReloadState::Watching);
    assert!(registry.resolve(HttpMethod::Get, "/api/users/42").is_some());

    // Requests that resolved against the old registry keep running to completion
    // even while the swap to v2 happens concurrently: the `Arc` they captured
    // stays valid, it's simply no longer the *live* one afterward.
    let (_, vars) = registry.resolve(HttpMethod::Get, "/api/users/42").unwrap();
    let in_flight = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        vars
    });

    let second = orchestrator.trigger().await;
    assert_eq!(second.state, ReloadState::Watching);

    let completed = in_flight.await.unwrap();
    assert_eq!(completed, vec![("id".to_string(), "42".to_string())]);

    assert!(registry.resolve(HttpMethod::Get, "/api/users/42").is_none(), "removed endpoint now 404s");
    assert!(
        registry
            .resolve(HttpMethod::Get, "/api/users/by-email/a@b.com")
            .is_some(),
        "added endpoint now resolves"
    );
}
