use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::CordalError;

/// The JSON error envelope returned by every endpoint on failure.
///
/// Shape is fixed by the external API contract: `error` carries the
/// taxonomy code, `message` a human-readable description, `path` the
/// request path that produced it, and `timestamp` the epoch-millisecond
/// instant the response was built.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Taxonomy code, e.g. `"QUERY_FAILED"`.
    pub error:     String,
    /// Human-readable description, safe to display to API consumers.
    pub message:   String,
    /// The request path that produced this error.
    pub path:      String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u128,
}

impl ErrorResponse {
    /// Build an envelope for `error` against `path`, stamped with the current time.
    #[must_use]
    pub fn new(error: &CordalError, path: impl Into<String>) -> Self {
        Self {
            error: error.code().as_str().to_string(),
            message: error.to_string(),
            path: path.into(),
            timestamp: now_millis(),
        }
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn status_for(error: &CordalError) -> StatusCode {
    match error {
        CordalError::BadRequest { .. } | CordalError::MissingParameter { .. } => {
            StatusCode::BAD_REQUEST
        }
        CordalError::NotFound { .. } => StatusCode::NOT_FOUND,
        CordalError::Conflict { .. } => StatusCode::CONFLICT,
        CordalError::DatabaseUnavailable { .. } | CordalError::UnknownDatabase(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CordalError::QueryFailed { .. } | CordalError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CordalError::ConfigInvalid { .. }
        | CordalError::DuplicateName { .. }
        | CordalError::EmptyConfiguration { .. }
        | CordalError::ParseError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// Pairs a [`CordalError`] with the request path it occurred on, so that
/// handlers can `.map_err(|e| WithPath(e, path.clone()))?` and let `?`
/// produce a correctly-shaped HTTP response.
#[derive(Debug)]
pub struct WithPath(pub CordalError, pub String);

impl IntoResponse for WithPath {
    fn into_response(self) -> Response {
        let Self(error, path) = self;
        let status = status_for(&error);
        let body = ErrorResponse::new(&error, path);
        (status, Json(body)).into_response()
    }
}

/// Enables the `?` operator in handlers that need to attach a request path
/// to an otherwise path-agnostic `Result<T, CordalError>`.
pub trait IntoHttpResponse {
    /// Convert into a full HTTP response, stamping `path` into the error envelope on failure.
    fn into_http_response(self, path: impl Into<String>) -> Response;
}

impl<T> IntoHttpResponse for Result<T, CordalError>
where
    T: IntoResponse,
{
    fn into_http_response(self, path: impl Into<String>) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(err) => WithPath(err, path.into()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = CordalError::NotFound {
            message: "no endpoint matched".into(),
        };
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_unavailable_maps_to_503() {
        let err = CordalError::DatabaseUnavailable {
            database: "primary".into(),
            message:  "pool exhausted".into(),
        };
        assert_eq!(status_for(&err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn envelope_carries_path_and_code() {
        let err = CordalError::MissingParameter { name: "id".into() };
        let body = ErrorResponse::new(&err, "/api/users/find".to_string());
        assert_eq!(body.error, "MISSING_PARAMETER");
        assert_eq!(body.path, "/api/users/find");
    }
}
