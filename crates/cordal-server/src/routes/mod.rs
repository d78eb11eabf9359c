//! HTTP surface: health, admin/introspection, and the config-driven fallback route.

pub mod admin;
pub mod health;

use crate::app_state::AppState;
use crate::dispatcher::{Dispatcher, RequestContext};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, Uri};
use axum::response::Response;
use axum::routing::{any, get, post};
use axum::Router;
use cordal_core::config::loader::ConfigLoader;
use cordal_core::config::HttpMethod;
use cordal_error::IntoHttpResponse;
use serde_json::Value;
use std::collections::HashMap;

/// Build the full router: fixed admin/health routes plus a fallback that
/// resolves every other request against the live [`crate::registry::EndpointRegistry`].
pub fn build<L: ConfigLoader + Send + Sync + 'static>(state: AppState<L>) -> Router {
    Router::new()
        .route("/api/health", get(health::health::<L>))
        .route("/api/generic/config/validate", get(admin::validate::<L>))
        .route("/api/generic/config/endpoints", get(admin::config_endpoints::<L>))
        .route("/api/generic/config/queries", get(admin::config_queries::<L>))
        .route("/api/generic/config/databases", get(admin::config_databases::<L>))
        .route("/api/generic/endpoints", get(admin::endpoints::<L>))
        .route("/api/metrics/endpoints", get(admin::metrics_endpoints::<L>))
        .route("/api/generic/reload", post(admin::reload::<L>))
        .fallback(any(dispatch_endpoint::<L>))
        .with_state(state)
}

fn method_of(method: &Method) -> Option<HttpMethod> {
    match *method {
        Method::GET => Some(HttpMethod::Get),
        Method::POST => Some(HttpMethod::Post),
        Method::PUT => Some(HttpMethod::Put),
        Method::DELETE => Some(HttpMethod::Delete),
        _ => None,
    }
}

async fn dispatch_endpoint<L: ConfigLoader + 'static>(
    State(state): State<AppState<L>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();

    let Some(http_method) = method_of(&method) else {
        let unsupported: Result<(), _> = Err(cordal_error::CordalError::BadRequest {
            message: format!("unsupported HTTP method '{method}'"),
        });
        return unsupported.into_http_response(path);
    };

    let parsed_body: Option<Value> = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };

    let snapshot = state.history.latest();
    let queries = snapshot.map(|s| s.config.queries).unwrap_or_default();

    let dispatcher = Dispatcher {
        registry: &state.registry,
        executor: &state.executor,
        caches: &state.caches,
        queries: &queries,
    };

    let ctx = RequestContext {
        method: http_method,
        path: &path,
        query: &query,
        body: parsed_body.as_ref(),
    };

    let result = dispatcher.dispatch(&ctx).await.map(|r| axum::Json(r.body));
    result.into_http_response(path)
}
