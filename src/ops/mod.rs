//! Operation Adapters Module
//!
//! Stateless bindings between route handlers and the managers. Each adapter
//! takes an explicit key (or key builder output) and a producer future; all
//! state lives in [`CacheManager`] / [`IdempotencyManager`].

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::cache::CacheManager;
use crate::error::IdempotencyError;
use crate::idempotency::{ClaimOutcome, IdempotencyManager};

// == Cached Op ==
/// Parameters for a read-through cached operation.
#[derive(Debug, Clone, Default)]
pub struct CachedOp<'a> {
    pub key: &'a str,
    pub namespace: Option<&'a str>,
    pub ttl: Option<u64>,
    pub force_refresh: bool,
}

impl<'a> CachedOp<'a> {
    pub fn new(key: &'a str) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    pub fn namespace(mut self, namespace: &'a str) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

// == Cached ==
/// Read path: cache-first, compute on miss, write back.
///
/// Cache faults fail open to the producer, so an outage costs latency, not
/// availability.
pub async fn cached<T, E, F, Fut>(
    manager: &CacheManager,
    op: CachedOp<'_>,
    producer: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    manager
        .get_or_set(op.key, op.namespace, op.ttl, op.force_refresh, producer)
        .await
}

// == Cache Busting ==
/// Write path: run the producer, then invalidate the listed keys.
///
/// Invalidation is best-effort; a failed delete is logged, not surfaced,
/// since the entries will still lapse at their TTL.
pub async fn cache_busting<T, E, F, Fut>(
    manager: &CacheManager,
    keys: &[&str],
    namespace: Option<&str>,
    producer: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let value = producer().await?;
    if let Err(e) = manager.delete(keys, namespace).await {
        warn!("Cache invalidation failed after write: {}", e);
    }
    Ok(value)
}

// == Idempotent ==
/// Write path with at-most-once semantics.
///
/// Claims the key, runs the handler on a fresh claim, persists the outcome,
/// and replays stored responses without re-executing. A duplicate in-flight
/// request surfaces as [`IdempotencyError::Duplicate`].
pub async fn idempotent<T, E, F, Fut>(
    manager: &IdempotencyManager,
    namespace: &str,
    key: &Uuid,
    handler: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    E: From<IdempotencyError> + std::fmt::Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let key_str = key.to_string();
    let outcome = manager
        .check_and_set_processing(namespace, &key_str)
        .await
        .map_err(E::from)?;

    match outcome {
        ClaimOutcome::Proceed => match handler().await {
            Ok(value) => {
                let response = serde_json::to_value(&value).map_err(|e| {
                    E::from(IdempotencyError::Storage(format!(
                        "Response is not serializable: {}",
                        e
                    )))
                })?;
                manager
                    .set_completed(namespace, &key_str, response)
                    .await
                    .map_err(E::from)?;
                Ok(value)
            }
            Err(e) => {
                // Best-effort: the handler error is the one the caller needs
                if let Err(mark_err) = manager
                    .set_failed(namespace, &key_str, e.to_string())
                    .await
                {
                    warn!("Failed to mark idempotency record failed: {}", mark_err);
                }
                Err(e)
            }
        },
        ClaimOutcome::Replay(record) => {
            let response = record.response.ok_or_else(|| {
                E::from(IdempotencyError::Storage(
                    "Completed record has no stored response".to_string(),
                ))
            })?;
            serde_json::from_value(response).map_err(|e| {
                E::from(IdempotencyError::Storage(format!(
                    "Stored response is corrupt: {}",
                    e
                )))
            })
        }
        ClaimOutcome::Conflict { retry_after } => Err(E::from(IdempotencyError::Duplicate {
            key: key_str,
            retry_after,
        })),
    }
}

// == Key Builder ==
/// Deterministic cache key from request arguments.
///
/// Length-prefixes each part before hashing so distinct argument lists can
/// never collide, then hex-encodes a SHA-256 digest. Use this at call sites
/// whose arguments are not namespace-safe strings.
pub fn hash_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.len().to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
