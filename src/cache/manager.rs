//! Cache Manager Module
//!
//! Composes a selected backend (remote with fallback to memory), key
//! namespacing, the serialize→compress pipeline, shared statistics, and the
//! per-key lock table that coalesces concurrent producers.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::cache::{
    codec, CacheBackend, CacheStats, KeyLocks, MemoryBackend, RemoteBackend, StatsSnapshot,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Active Backend ==
/// Which backend currently serves operations. Selected at construction,
/// switchable at runtime through the admin operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveBackend {
    Remote,
    Memory,
}

// == Cache Manager ==
/// Read-through cache facade over the two backends.
///
/// Cache reads fail open at call sites (an outage degrades latency, not
/// availability); all backend faults are counted in statistics and surfaced
/// as [`CacheError::Key`].
pub struct CacheManager {
    remote: Option<Arc<RemoteBackend>>,
    memory: Arc<MemoryBackend>,
    active: RwLock<ActiveBackend>,
    stats: Arc<CacheStats>,
    locks: KeyLocks,
    key_prefix: String,
    default_ttl: u64,
    max_ttl: u64,
    compression_enabled: bool,
    compression_threshold: usize,
    clear_batch_size: usize,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("key_prefix", &self.key_prefix)
            .field("remote_configured", &self.remote.is_some())
            .finish()
    }
}

impl CacheManager {
    // == Constructors ==
    /// Builds a manager from configuration, attempting the remote backend
    /// first and falling back to memory when it is unreachable.
    pub async fn from_config(config: &Config) -> Self {
        let stats = Arc::new(CacheStats::new());
        let memory = Arc::new(MemoryBackend::with_stats(config.max_entries, stats.clone()));

        let (remote, active) = match &config.redis_url {
            Some(url) => match RemoteBackend::connect(url).await {
                Ok(backend) => {
                    info!("Cache manager using remote backend");
                    (Some(Arc::new(backend)), ActiveBackend::Remote)
                }
                Err(e) => {
                    warn!(
                        "Remote cache unavailable, falling back to memory backend: {}",
                        e
                    );
                    (None, ActiveBackend::Memory)
                }
            },
            None => {
                info!("No remote cache configured, using memory backend");
                (None, ActiveBackend::Memory)
            }
        };

        Self::build(config, stats, memory, remote, active)
    }

    /// Builds a memory-only manager. Used in tests and by deployments that
    /// never configure a remote cache.
    pub fn memory_only(config: &Config) -> Self {
        let stats = Arc::new(CacheStats::new());
        let memory = Arc::new(MemoryBackend::with_stats(config.max_entries, stats.clone()));
        Self::build(config, stats, memory, None, ActiveBackend::Memory)
    }

    fn build(
        config: &Config,
        stats: Arc<CacheStats>,
        memory: Arc<MemoryBackend>,
        remote: Option<Arc<RemoteBackend>>,
        active: ActiveBackend,
    ) -> Self {
        Self {
            remote,
            memory,
            active: RwLock::new(active),
            stats,
            locks: KeyLocks::new(config.max_locks),
            key_prefix: config.key_prefix.clone(),
            default_ttl: config.default_ttl,
            max_ttl: config.max_ttl,
            compression_enabled: config.compression_enabled,
            compression_threshold: config.compression_threshold,
            clear_batch_size: config.clear_batch_size,
        }
    }

    // == Backend Selection ==
    async fn backend(&self) -> Arc<dyn CacheBackend> {
        match *self.active.read().await {
            ActiveBackend::Remote => match &self.remote {
                Some(remote) => remote.clone(),
                None => self.memory.clone(),
            },
            ActiveBackend::Memory => self.memory.clone(),
        }
    }

    /// Name of the backend currently serving operations.
    pub async fn active_backend(&self) -> &'static str {
        self.backend().await.name()
    }

    /// The in-memory backend, for the background sweep task.
    pub fn memory_backend(&self) -> Arc<MemoryBackend> {
        self.memory.clone()
    }

    /// The backend serving operations right now, as a shareable handle.
    /// Other subsystems (idempotency records) store state through this.
    pub async fn shared_backend(&self) -> Arc<dyn CacheBackend> {
        self.backend().await
    }

    /// Switches to the in-memory backend. Returns `false` when it was
    /// already active.
    pub async fn use_memory_backend(&self) -> bool {
        let mut active = self.active.write().await;
        if *active == ActiveBackend::Memory {
            return false;
        }
        *active = ActiveBackend::Memory;
        info!("Cache backend switched to memory");
        true
    }

    /// Switches back to the remote backend. Returns `false` when it was
    /// already active; errors when no remote backend was configured.
    pub async fn use_remote_backend(&self) -> Result<bool> {
        if self.remote.is_none() {
            return Err(CacheError::Backend(
                "Remote backend is not configured".to_string(),
            ));
        }
        let mut active = self.active.write().await;
        if *active == ActiveBackend::Remote {
            return Ok(false);
        }
        *active = ActiveBackend::Remote;
        info!("Cache backend switched to remote");
        Ok(true)
    }

    // == Key Layout ==
    /// `prefix:namespace:key`, namespace optional.
    fn full_key(&self, key: &str, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) => format!("{}:{}:{}", self.key_prefix, ns, key),
            None => format!("{}:{}", self.key_prefix, key),
        }
    }

    fn clamp_ttl(&self, ttl: Option<u64>) -> u64 {
        ttl.unwrap_or(self.default_ttl).min(self.max_ttl)
    }

    fn key_error(&self, key: &str, err: CacheError) -> CacheError {
        self.stats.record_error();
        error!(key = key, "Cache backend operation failed: {}", err);
        CacheError::Key {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }

    // == Get ==
    /// Returns the cached value for `key`, or `None` on a miss.
    ///
    /// Corrupt entries are purged and reported as deserialization errors;
    /// backend faults are counted and re-raised as [`CacheError::Key`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        namespace: Option<&str>,
    ) -> Result<Option<T>> {
        self.read(key, namespace, true).await
    }

    /// Backing read for [`get`](Self::get) and the coalesced re-check in
    /// [`get_or_set`](Self::get_or_set). The re-check passes `count_miss:
    /// false` so one logical miss is counted once, not once per lookup.
    async fn read<T: DeserializeOwned>(
        &self,
        key: &str,
        namespace: Option<&str>,
        count_miss: bool,
    ) -> Result<Option<T>> {
        let full = self.full_key(key, namespace);
        let raw = self
            .backend()
            .await
            .get(&full)
            .await
            .map_err(|e| self.key_error(&full, e))?;

        match raw {
            None => {
                if count_miss {
                    self.stats.record_miss();
                }
                Ok(None)
            }
            Some(payload) => {
                self.stats.record_bytes_read(payload.len() as u64);
                match codec::decode(&payload) {
                    Ok(value) => {
                        self.stats.record_hit();
                        Ok(Some(value))
                    }
                    Err(e) => {
                        self.stats.record_error();
                        warn!(key = %full, "Purging corrupt cache entry: {}", e);
                        let _ = self.backend().await.delete(&[full]).await;
                        Err(e)
                    }
                }
            }
        }
    }

    // == Set ==
    /// Serializes and stores `value` under `key`.
    ///
    /// TTL is clamped to `[0, max_ttl]`; `None` takes the configured default.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
        namespace: Option<&str>,
    ) -> Result<()> {
        let full = self.full_key(key, namespace);
        let ttl = self.clamp_ttl(ttl);
        let payload = codec::encode(value, self.compression_enabled, self.compression_threshold)?;

        self.backend()
            .await
            .set(&full, &payload, Some(ttl))
            .await
            .map_err(|e| self.key_error(&full, e))?;

        self.stats.record_set();
        self.stats.record_bytes_written(payload.len() as u64);
        Ok(())
    }

    // == Delete ==
    /// Removes the given keys, returning how many were present.
    pub async fn delete(&self, keys: &[&str], namespace: Option<&str>) -> Result<u64> {
        let full: Vec<String> = keys.iter().map(|k| self.full_key(k, namespace)).collect();
        let removed = self
            .backend()
            .await
            .delete(&full)
            .await
            .map_err(|e| self.key_error(&full.join(","), e))?;
        self.stats.record_deletes(removed);
        Ok(removed)
    }

    // == Exists ==
    /// Counts how many of the given keys are present.
    pub async fn exists(&self, keys: &[&str], namespace: Option<&str>) -> Result<u64> {
        let full: Vec<String> = keys.iter().map(|k| self.full_key(k, namespace)).collect();
        self.backend()
            .await
            .exists(&full)
            .await
            .map_err(|e| self.key_error(&full.join(","), e))
    }

    // == Expire ==
    /// Resets the expiry of `key`; `false` when the key is absent.
    pub async fn expire(&self, key: &str, seconds: u64, namespace: Option<&str>) -> Result<bool> {
        let full = self.full_key(key, namespace);
        self.backend()
            .await
            .expire(&full, seconds)
            .await
            .map_err(|e| self.key_error(&full, e))
    }

    // == TTL ==
    /// Remaining TTL in seconds: `-2` absent, `-1` no expiry, else remaining.
    pub async fn ttl(&self, key: &str, namespace: Option<&str>) -> Result<i64> {
        let full = self.full_key(key, namespace);
        self.backend()
            .await
            .ttl(&full)
            .await
            .map_err(|e| self.key_error(&full, e))
    }

    // == Get Or Set ==
    /// Read-through fetch with per-key coalescing.
    ///
    /// For N concurrent callers of the same key within this process,
    /// `compute` runs at most once; every caller observes the same value.
    ///
    /// 1. Unless `force_refresh`, try a normal read and return on a hit.
    /// 2. Acquire the per-key lock from the bounded table.
    /// 3. Re-check the cache under the lock (another caller may have
    ///    filled it while this one waited).
    /// 4. On a continued miss, run `compute`, write its result back, and
    ///    return it.
    ///
    /// The lock guard drops on every exit path (success, error,
    /// cancellation), so waiters are never deadlocked. Cache faults inside
    /// this method fail open; only `compute` errors propagate.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        namespace: Option<&str>,
        ttl: Option<u64>,
        force_refresh: bool,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if !force_refresh {
            match self.get::<T>(key, namespace).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => warn!(key = key, "Cache read failed, treating as miss: {}", e),
            }
        }

        let lock = self.locks.acquire(&self.full_key(key, namespace));
        let _guard = lock.lock().await;

        if !force_refresh {
            match self.read::<T>(key, namespace, false).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => warn!(key = key, "Cache re-check failed, treating as miss: {}", e),
            }
        }

        let value = compute().await?;
        if let Err(e) = self.set(key, &value, ttl, namespace).await {
            warn!(key = key, "Cache write-back failed after compute: {}", e);
        }
        Ok(value)
    }

    // == Clear ==
    /// Deletes every key in the namespace (or the whole prefix) in bounded
    /// batches, then resets statistics. Returns the number of keys removed.
    pub async fn clear(&self, namespace: Option<&str>) -> Result<u64> {
        let pattern = match namespace {
            Some(ns) => format!("{}:{}:*", self.key_prefix, ns),
            None => format!("{}:*", self.key_prefix),
        };

        let backend = self.backend().await;
        let keys = backend
            .scan(&pattern)
            .await
            .map_err(|e| self.key_error(&pattern, e))?;

        let mut deleted = 0;
        for chunk in keys.chunks(self.clear_batch_size) {
            deleted += backend
                .delete(chunk)
                .await
                .map_err(|e| self.key_error(&pattern, e))?;
        }

        info!(pattern = %pattern, deleted = deleted, "Cache cleared");
        self.stats.reset();
        Ok(deleted)
    }

    // == Ping ==
    /// Liveness of the active backend; `false` rather than an error.
    pub async fn ping(&self) -> bool {
        self.backend().await.ping().await.unwrap_or(false)
    }

    // == Statistics ==
    pub fn get_statistics(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.stats.reset();
    }
}
