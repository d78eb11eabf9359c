//! Unified error taxonomy for CORDAL.
//!
//! Every crate in the workspace reports failures through [`CordalError`] so
//! that the HTTP layer has exactly one place to map internal failures onto
//! the error envelope of the external API.

#![warn(missing_docs)]

mod http;

pub use http::{ErrorResponse, IntoHttpResponse, WithPath};

use std::path::PathBuf;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CordalError>;

/// The error taxonomy codes from the external error envelope.
///
/// Kept as a separate enum (rather than deriving the code from
/// [`CordalError`]'s variant name) so that HTTP status and wire code stay in
/// one place, `error_code()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed or invalid parameter.
    BadRequest,
    /// A required parameter was absent.
    MissingParameter,
    /// No endpoint matched, or a named resource does not exist.
    NotFound,
    /// Duplicate configuration name on save.
    Conflict,
    /// The backing connection pool is down or unreachable.
    DatabaseUnavailable,
    /// The SQL statement failed to execute.
    QueryFailed,
    /// Configuration failed validation.
    ConfigInvalid,
    /// Uncategorized failure.
    Internal,
}

impl ErrorCode {
    /// The wire representation used in the error envelope's `error` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::DatabaseUnavailable => "DATABASE_UNAVAILABLE",
            Self::QueryFailed => "QUERY_FAILED",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// The single error type crossing crate boundaries in CORDAL.
///
/// Variants map 1:1 onto the taxonomy in spec §7. Driver-specific error
/// types (`tokio_postgres::Error`, `std::io::Error`, …) are captured as
/// opaque `message` strings rather than exposed to callers, so that no
/// crate outside this one needs to depend on a database driver just to
/// match on an error.
#[derive(Debug, thiserror::Error)]
pub enum CordalError {
    /// A parameter failed type coercion or otherwise violated its declared shape.
    #[error("bad request: {message}")]
    BadRequest {
        /// Human-readable description of what was wrong.
        message: String,
    },

    /// A required parameter was not supplied and had no default.
    #[error("missing required parameter '{name}'")]
    MissingParameter {
        /// The parameter name.
        name: String,
    },

    /// No endpoint matched the request path/method, or a named entity does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was not found.
        message: String,
    },

    /// A configuration save attempted to reuse an existing name.
    #[error("conflicting configuration name '{name}'")]
    Conflict {
        /// The colliding name.
        name: String,
    },

    /// The named database's connection pool could not serve a connection.
    #[error("database '{database}' unavailable: {message}")]
    DatabaseUnavailable {
        /// The database name from `DatabaseDefinition::name`.
        database: String,
        /// Driver-level detail, safe to log but not to leak to the HTTP caller verbatim.
        message:  String,
    },

    /// A query reached the database but the database rejected or failed it.
    #[error("query '{query}' failed: {message}")]
    QueryFailed {
        /// The query name from `QueryDefinition::name`.
        query:   String,
        /// Driver-level detail.
        message: String,
    },

    /// Configuration failed validation (duplicate names, dangling references, arity mismatch, …).
    #[error("configuration invalid: {message}")]
    ConfigInvalid {
        /// Human-readable summary; full detail lives in the `ValidationReport`.
        message: String,
    },

    /// Two or more files in the same configuration kind declared the same name.
    #[error("duplicate {kind} name '{name}' in {first} and {second}")]
    DuplicateName {
        /// `database`, `query`, or `endpoint`.
        kind:   &'static str,
        /// The colliding name.
        name:   String,
        /// Path that declared it first.
        first:  PathBuf,
        /// Path that declared it again.
        second: PathBuf,
    },

    /// A configuration source produced zero entries for one of the three kinds.
    #[error("empty configuration: no {kind} defined")]
    EmptyConfiguration {
        /// `databases`, `queries`, or `endpoints`.
        kind: &'static str,
    },

    /// A configuration source file or row could not be parsed.
    #[error("failed to parse configuration at {location}: {message}")]
    ParseError {
        /// File path or table/row identifier.
        location: String,
        /// Underlying parser message.
        message:  String,
    },

    /// Lookup against a database name the pool manager has never heard of.
    #[error("unknown database '{0}'")]
    UnknownDatabase(String),

    /// Uncategorized internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable description.
        message: String,
    },
}

impl CordalError {
    /// The taxonomy code for this error, per spec §7.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest { .. } => ErrorCode::BadRequest,
            Self::MissingParameter { .. } => ErrorCode::MissingParameter,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::DatabaseUnavailable { .. } => ErrorCode::DatabaseUnavailable,
            Self::QueryFailed { .. } => ErrorCode::QueryFailed,
            Self::ConfigInvalid { .. }
            | Self::DuplicateName { .. }
            | Self::EmptyConfiguration { .. }
            | Self::ParseError { .. } => ErrorCode::ConfigInvalid,
            Self::UnknownDatabase(_) => ErrorCode::DatabaseUnavailable,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }
}
