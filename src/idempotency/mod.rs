//! Idempotency Module
//!
//! At-most-once execution for HTTP mutation endpoints: a caller-supplied
//! key scopes each request, and a TTL-bound record in the cache backend
//! tracks it through `processing` → `completed`/`failed`.
//!
//! Unlike cache reads, nothing here fails open: a storage fault during a
//! transition propagates, because silently skipping deduplication can cause
//! duplicate side effects.

mod record;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::CacheBackend;
use crate::error::{IdempotencyError, IdempotencyResult};

pub use record::{IdempotencyRecord, IdempotencyStatus};

// Key prefix for idempotency records; separate from the cache prefix so
// namespace clears cannot touch deduplication state.
const KEY_PREFIX: &str = "idempotency";

// Batch size for admin clears.
const CLEAR_BATCH: usize = 500;

// == Claim Outcome ==
/// Result of attempting to claim an idempotency key.
///
/// All three outcomes must be handled at every call site.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// Fresh claim or retry after failure: execute the operation.
    Proceed,
    /// The operation already finished: return the stored response without
    /// re-executing.
    Replay(IdempotencyRecord),
    /// Another execution is in flight: reject with a retry hint.
    Conflict { retry_after: u64 },
}

// == Metrics ==
/// Per-manager counters; observation only, no effect on control flow.
#[derive(Debug, Default)]
pub struct IdempotencyMetrics {
    total_requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    duplicates_blocked: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time view of the metrics.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IdempotencyMetricsSnapshot {
    pub total_requests: u64,
    /// Replays of completed requests
    pub hits: u64,
    /// Fresh claims
    pub misses: u64,
    pub duplicates_blocked: u64,
    pub failures: u64,
}

impl IdempotencyMetrics {
    fn snapshot(&self) -> IdempotencyMetricsSnapshot {
        IdempotencyMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            duplicates_blocked: self.duplicates_blocked.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

// == Idempotency Manager ==
/// State machine over any [`CacheBackend`].
///
/// At most one `processing` record exists per `(namespace, key)` at any
/// instant, enforced by the backend's atomic claim.
pub struct IdempotencyManager {
    backend: Arc<dyn CacheBackend>,
    /// Record lifetime in seconds; abandoned claims self-clean at expiry
    ttl: u64,
    /// Retry-After hint returned on duplicate in-flight requests
    retry_after: u64,
    metrics: IdempotencyMetrics,
}

impl std::fmt::Debug for IdempotencyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyManager")
            .field("ttl", &self.ttl)
            .field("retry_after", &self.retry_after)
            .finish()
    }
}

impl IdempotencyManager {
    // == Constructor ==
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: u64, retry_after: u64) -> Self {
        Self {
            backend,
            ttl,
            retry_after,
            metrics: IdempotencyMetrics::default(),
        }
    }

    fn record_key(&self, namespace: &str, key: &str) -> String {
        format!("{}:{}:{}", KEY_PREFIX, namespace, key)
    }

    fn storage_err(op: &str, e: impl std::fmt::Display) -> IdempotencyError {
        IdempotencyError::Storage(format!("{}: {}", op, e))
    }

    async fn load_record(&self, full_key: &str) -> IdempotencyResult<Option<IdempotencyRecord>> {
        let raw = self
            .backend
            .get(full_key)
            .await
            .map_err(|e| Self::storage_err("record read failed", e))?;
        match raw {
            None => Ok(None),
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                // A corrupt record is a correctness fault, not a miss
                .map_err(|e| Self::storage_err("record is corrupt", e)),
        }
    }

    async fn store_record(
        &self,
        full_key: &str,
        record: &IdempotencyRecord,
    ) -> IdempotencyResult<()> {
        let payload = serde_json::to_string(record)
            .map_err(|e| Self::storage_err("record encoding failed", e))?;
        self.backend
            .set(full_key, &payload, Some(self.ttl))
            .await
            .map_err(|e| Self::storage_err("record write failed", e))
    }

    // == Claim ==
    /// Attempts the `∅→processing` (or `failed→processing`) transition.
    ///
    /// - `Proceed`: this caller won the claim and must execute the
    ///   operation, then call [`set_completed`](Self::set_completed) or
    ///   [`set_failed`](Self::set_failed).
    /// - `Replay`: the operation already completed; return the stored
    ///   response verbatim.
    /// - `Conflict`: another execution is in flight.
    pub async fn check_and_set_processing(
        &self,
        namespace: &str,
        key: &str,
    ) -> IdempotencyResult<ClaimOutcome> {
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);
        let full_key = self.record_key(namespace, key);

        match self.load_record(&full_key).await? {
            Some(record) => match record.status {
                IdempotencyStatus::Completed => {
                    debug!(key = %full_key, "Replaying completed request");
                    self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(ClaimOutcome::Replay(record))
                }
                IdempotencyStatus::Processing => {
                    warn!(key = %full_key, "Duplicate request while in flight");
                    self.metrics
                        .duplicates_blocked
                        .fetch_add(1, Ordering::Relaxed);
                    Ok(ClaimOutcome::Conflict {
                        retry_after: self.retry_after,
                    })
                }
                IdempotencyStatus::Failed => {
                    // Retry admission must be atomic: concurrent claimants all
                    // see the same failed record, so they race for a one-shot
                    // marker derived from its completion time. Exactly one
                    // `set_if_absent` wins and returns the record to
                    // processing; the rest are rejected.
                    let token = record
                        .completed_at
                        .map(|t| t.timestamp_millis())
                        .unwrap_or_default();
                    let marker_key = format!("{}:retry:{}", full_key, token);
                    let won = self
                        .backend
                        .set_if_absent(&marker_key, "1", Some(self.retry_after.max(1)))
                        .await
                        .map_err(|e| Self::storage_err("retry claim failed", e))?;

                    if won {
                        debug!(key = %full_key, "Retry after failure permitted");
                        self.store_record(&full_key, &IdempotencyRecord::processing())
                            .await?;
                        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                        Ok(ClaimOutcome::Proceed)
                    } else {
                        warn!(key = %full_key, "Concurrent retry claim lost");
                        self.metrics
                            .duplicates_blocked
                            .fetch_add(1, Ordering::Relaxed);
                        Ok(ClaimOutcome::Conflict {
                            retry_after: self.retry_after,
                        })
                    }
                }
            },
            None => {
                let record = IdempotencyRecord::processing();
                let payload = serde_json::to_string(&record)
                    .map_err(|e| Self::storage_err("record encoding failed", e))?;
                let claimed = self
                    .backend
                    .set_if_absent(&full_key, &payload, Some(self.ttl))
                    .await
                    .map_err(|e| Self::storage_err("claim write failed", e))?;

                if claimed {
                    self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                    Ok(ClaimOutcome::Proceed)
                } else {
                    // Lost the race to a concurrent claimant
                    warn!(key = %full_key, "Concurrent claim lost");
                    self.metrics
                        .duplicates_blocked
                        .fetch_add(1, Ordering::Relaxed);
                    Ok(ClaimOutcome::Conflict {
                        retry_after: self.retry_after,
                    })
                }
            }
        }
    }

    // == Terminal Transitions ==
    /// `processing → completed`; the response is immutable until TTL expiry.
    pub async fn set_completed(
        &self,
        namespace: &str,
        key: &str,
        response: serde_json::Value,
    ) -> IdempotencyResult<()> {
        let full_key = self.record_key(namespace, key);
        let created_at = self
            .load_record(&full_key)
            .await?
            .map(|r| r.created_at)
            .unwrap_or_else(chrono::Utc::now);
        self.store_record(&full_key, &IdempotencyRecord::completed(created_at, response))
            .await
    }

    /// `processing → failed`; a later claim is admitted for one retry.
    pub async fn set_failed(
        &self,
        namespace: &str,
        key: &str,
        error: String,
    ) -> IdempotencyResult<()> {
        self.metrics.failures.fetch_add(1, Ordering::Relaxed);
        let full_key = self.record_key(namespace, key);
        let created_at = self
            .load_record(&full_key)
            .await?
            .map(|r| r.created_at)
            .unwrap_or_else(chrono::Utc::now);
        self.store_record(&full_key, &IdempotencyRecord::failed(created_at, error))
            .await
    }

    // == Read / Admin ==
    /// Current record, if any.
    pub async fn get_record(
        &self,
        namespace: &str,
        key: &str,
    ) -> IdempotencyResult<Option<IdempotencyRecord>> {
        let full_key = self.record_key(namespace, key);
        self.load_record(&full_key).await
    }

    /// Removes a record; `true` when it existed.
    pub async fn delete(&self, namespace: &str, key: &str) -> IdempotencyResult<bool> {
        let full_key = self.record_key(namespace, key);
        let removed = self
            .backend
            .delete(&[full_key])
            .await
            .map_err(|e| Self::storage_err("record delete failed", e))?;
        Ok(removed > 0)
    }

    /// Removes every record in a namespace. O(namespace size); admin only.
    pub async fn clear_namespace(&self, namespace: &str) -> IdempotencyResult<u64> {
        self.clear_pattern(&format!("{}:{}:*", KEY_PREFIX, namespace))
            .await
    }

    /// Removes every record. O(keyspace); admin only.
    pub async fn clear_all(&self) -> IdempotencyResult<u64> {
        self.clear_pattern(&format!("{}:*", KEY_PREFIX)).await
    }

    async fn clear_pattern(&self, pattern: &str) -> IdempotencyResult<u64> {
        let keys = self
            .backend
            .scan(pattern)
            .await
            .map_err(|e| Self::storage_err("record scan failed", e))?;

        let mut deleted = 0;
        for chunk in keys.chunks(CLEAR_BATCH) {
            deleted += self
                .backend
                .delete(chunk)
                .await
                .map_err(|e| Self::storage_err("record delete failed", e))?;
        }
        Ok(deleted)
    }

    // == Metrics ==
    pub fn get_metrics(&self) -> IdempotencyMetricsSnapshot {
        self.metrics.snapshot()
    }
}
