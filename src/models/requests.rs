//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for the set operation (PUT /cache)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store, any JSON shape
    pub value: serde_json::Value,
    /// Optional TTL in seconds, clamped to the configured maximum
    #[serde(default)]
    pub ttl: Option<u64>,
    /// Optional namespace segment
    #[serde(default)]
    pub namespace: Option<String>,
}

impl SetRequest {
    /// Returns an error message if the request is invalid, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if let Some(ns) = &self.namespace {
            if ns.is_empty() {
                return Some("Namespace cannot be empty when present".to_string());
            }
        }
        None
    }
}

/// Request body for the clear operation (POST /cache/clear)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearRequest {
    /// Restrict the clear to a single namespace; absent means everything
    /// under the configured key prefix
    #[serde(default)]
    pub namespace: Option<String>,
}
