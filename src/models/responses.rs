//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies. Error bodies are
//! produced by the error types' `IntoResponse` impls, not here.

use serde::Serialize;

/// Response body for the get operation (GET /cache/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: serde_json::Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the set operation (PUT /cache)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the delete operation (DELETE /cache/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    /// Number of entries removed (0 or 1 for the single-key route)
    pub deleted: u64,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, deleted: u64) -> Self {
        Self {
            key: key.into(),
            deleted,
        }
    }
}

/// Response body for the clear operation (POST /cache/clear)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Number of entries removed
    pub cleared: u64,
    /// Namespace that was cleared, if the clear was scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Response body for the backend switch operations (POST /backend/*)
#[derive(Debug, Clone, Serialize)]
pub struct SwitchResponse {
    /// Backend now serving requests ("memory" or "remote")
    pub active_backend: String,
    /// False when the requested backend was already active
    pub switched: bool,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" when the active backend answers a ping, "degraded" otherwise
    pub status: String,
    /// Backend currently serving requests
    pub active_backend: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(backend_up: bool, active_backend: impl Into<String>) -> Self {
        Self {
            status: if backend_up { "healthy" } else { "degraded" }.to_string(),
            active_backend: active_backend.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
