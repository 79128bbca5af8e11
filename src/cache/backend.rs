//! Cache Backend Trait
//!
//! Contract satisfied by both storage backends. The manager selects one
//! implementation at construction time; callers never branch on the
//! concrete type.

use async_trait::async_trait;

use crate::error::Result;

// == Cache Backend Trait ==
/// Storage operations shared by the in-memory and remote backends.
///
/// Values are opaque payload strings (serialization and compression happen
/// above this layer). TTLs are in seconds; `None` means no expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the payload for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, overwriting any previous payload.
    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()>;

    /// Stores `value` only if `key` is currently absent.
    ///
    /// Returns `true` when this call created the entry. The check and the
    /// write are atomic; the idempotency claim depends on it.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<bool>;

    /// Removes the given keys, returning how many were present.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Counts how many of the given keys are present (and unexpired).
    async fn exists(&self, keys: &[String]) -> Result<u64>;

    /// Resets the expiry of `key` to `seconds` from now.
    ///
    /// Returns `false` if the key is absent.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    /// Remaining TTL in seconds: `-2` absent, `-1` no expiry, else remaining.
    async fn ttl(&self, key: &str) -> Result<i64>;

    /// Enumerates keys matching a `*`-glob pattern. O(keyspace); admin paths only.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    /// Liveness check.
    async fn ping(&self) -> Result<bool>;

    /// Short backend identifier for logs and health reports.
    fn name(&self) -> &'static str;
}
