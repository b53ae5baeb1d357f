//! Error types shared across the router.

use thiserror::Error;

/// Registration-time failures. Route tables are fixed at startup, so any of
/// these indicates a mistake in the route definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route pattern `{pattern}` conflicts with an existing route: {reason}")]
    ConflictingRoute { pattern: String, reason: String },

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl RouteError {
    pub(crate) fn conflict(pattern: &str, reason: impl Into<String>) -> Self {
        RouteError::ConflictingRoute {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors returned to handlers by the response helpers on `Context`.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}
