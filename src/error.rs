//! Error types for the caching core
//!
//! Provides unified error handling using thiserror. Cache errors are
//! recoverable at call sites (read paths fail open); idempotency errors
//! carry the HTTP contract for mutation endpoints and always propagate.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found (admin API lookups only; library reads return `None`)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Backend-level failure surfaced to the caller for a specific key
    #[error("Cache operation failed for key '{key}': {reason}")]
    Key { key: String, reason: String },

    /// Raw backend failure (connection, protocol, storage)
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Stored payload could not be decoded back into a value
    #[error("Cache deserialization error: {0}")]
    Deserialization(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CacheError::Key { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            CacheError::Backend(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            CacheError::Deserialization(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Idempotency Error Enum ==
/// Error type for the idempotency state machine and its HTTP contract.
#[derive(Error, Debug)]
pub enum IdempotencyError {
    /// Another execution with the same key is currently in flight
    #[error("Duplicate request in flight for idempotency key '{key}'")]
    Duplicate {
        key: String,
        /// Seconds the client should wait before retrying
        retry_after: u64,
    },

    /// The `Idempotency-Key` header was required but absent
    #[error("Missing Idempotency-Key header")]
    MissingKey,

    /// The `Idempotency-Key` header is not a valid UUID
    #[error("Invalid Idempotency-Key header: {0}")]
    InvalidKey(String),

    /// Storage-layer failure during a state transition.
    ///
    /// Never treated as a miss: skipping deduplication silently can cause
    /// duplicate side effects.
    #[error("Idempotency storage error: {0}")]
    Storage(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for IdempotencyError {
    fn into_response(self) -> Response {
        match &self {
            IdempotencyError::Duplicate { key, retry_after } => {
                let body = Json(json!({
                    "error": self.to_string(),
                    "code": "duplicate_request",
                    "idempotency_key": key,
                    "retry_after": retry_after,
                }));
                (
                    StatusCode::CONFLICT,
                    [(header::RETRY_AFTER, retry_after.to_string())],
                    body,
                )
                    .into_response()
            }
            IdempotencyError::MissingKey => {
                let body = Json(json!({
                    "error": self.to_string(),
                    "code": "missing_idempotency_key",
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            IdempotencyError::InvalidKey(_) => {
                let body = Json(json!({
                    "error": self.to_string(),
                    "code": "invalid_idempotency_key",
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            IdempotencyError::Storage(msg) => {
                let body = Json(json!({
                    "error": msg,
                    "code": "idempotency_storage_error",
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

// == Result Type Aliases ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Convenience Result type for idempotency operations.
pub type IdempotencyResult<T> = std::result::Result<T, IdempotencyError>;
