use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

// ---------------------------------------------------------------------------
// HTTP surface
// ---------------------------------------------------------------------------

/// JSON body returned for failed HTTP requests.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Not found".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiErrorBody { error: self.message })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Backing store failures
// ---------------------------------------------------------------------------

/// Failure reported by the comment store or the cache.
#[derive(Debug)]
pub enum StoreError {
    Database(diesel::result::Error),
    Pool(String),
    Cache(redis::RedisError),
    Serialization(serde_json::Error),
    /// Free-form failure, mostly raised by test doubles.
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(err) => write!(f, "database error: {err}"),
            StoreError::Pool(err) => write!(f, "connection pool error: {err}"),
            StoreError::Cache(err) => write!(f, "cache error: {err}"),
            StoreError::Serialization(err) => write!(f, "serialization error: {err}"),
            StoreError::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Database(err)
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for StoreError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(%err, "store error");
        Self::internal("Health handler error")
    }
}

// ---------------------------------------------------------------------------
// Comment mutation failures
// ---------------------------------------------------------------------------

/// Why a comment mutation was rejected. Each variant maps to one fixed ack message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentError {
    /// A required field is missing or empty.
    Validation,
    /// The comment does not exist or belongs to someone else.
    Forbidden,
    /// Persistence or another unexpected failure.
    Server,
}

impl CommentError {
    pub fn message(self) -> &'static str {
        match self {
            CommentError::Validation => "Validation error",
            CommentError::Forbidden => "Forbidden",
            CommentError::Server => "Server error",
        }
    }
}

impl fmt::Display for CommentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for CommentError {}

impl From<StoreError> for CommentError {
    fn from(err: StoreError) -> Self {
        tracing::error!(%err, "comment store error");
        Self::Server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_errors_use_fixed_wire_messages() {
        assert_eq!(CommentError::Validation.to_string(), "Validation error");
        assert_eq!(CommentError::Forbidden.to_string(), "Forbidden");
        assert_eq!(CommentError::Server.to_string(), "Server error");
    }

    #[test]
    fn store_errors_collapse_to_server_error() {
        let err: CommentError = StoreError::Other("boom".to_string()).into();
        assert_eq!(err, CommentError::Server);

        let api: ApiError = StoreError::Pool("timed out".to_string()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Health handler error");
    }

    #[test]
    fn not_found_body() {
        let err = ApiError::not_found();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Not found");
    }
}
