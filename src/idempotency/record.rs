//! Idempotency Record Module
//!
//! Persisted state-machine record for deduplicated mutation requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Record Status ==
/// State of a deduplicated request.
///
/// `Completed` is terminal until TTL expiry (replay-only); `Failed` admits
/// exactly one more claim per retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyStatus {
    Processing,
    Completed,
    Failed,
}

// == Idempotency Record ==
/// Wire format:
/// `{ status, response?, error?, created_at, completed_at? }`
/// with ISO-8601 timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdempotencyRecord {
    pub status: IdempotencyStatus,
    /// Stored handler response, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Failure message, present once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl IdempotencyRecord {
    /// Fresh claim: a record never exists in a pre-processing state.
    pub fn processing() -> Self {
        Self {
            status: IdempotencyStatus::Processing,
            response: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Terminal success transition, preserving the claim timestamp.
    pub fn completed(created_at: DateTime<Utc>, response: serde_json::Value) -> Self {
        Self {
            status: IdempotencyStatus::Completed,
            response: Some(response),
            error: None,
            created_at,
            completed_at: Some(Utc::now()),
        }
    }

    /// Terminal failure transition, preserving the claim timestamp.
    pub fn failed(created_at: DateTime<Utc>, error: String) -> Self {
        Self {
            status: IdempotencyStatus::Failed,
            response: None,
            error: Some(error),
            created_at,
            completed_at: Some(Utc::now()),
        }
    }
}
