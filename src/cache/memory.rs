//! Memory Backend Module
//!
//! In-process safety-net backend: bounded key/value store with per-key TTL
//! and LRU eviction. Used standalone or as the fallback when the remote
//! backend is unreachable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::cache::{CacheStats, LruTracker, StoredEntry, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

// == Memory Store ==
/// Entry map plus recency order, guarded together so every compound
/// read-modify-write happens under one lock.
#[derive(Debug, Default)]
struct MemoryStore {
    entries: HashMap<String, StoredEntry>,
    lru: LruTracker,
}

impl MemoryStore {
    /// Removes an expired entry if present, so expired keys read as absent.
    fn purge_if_expired(&mut self, key: &str) -> bool {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                self.entries.remove(key);
                self.lru.remove(key);
                return true;
            }
        }
        false
    }
}

// == Memory Backend ==
/// Bounded LRU+TTL store with no external dependencies.
///
/// Expiry is lazy: accessors treat expired entries as absent and purge them
/// in place; a periodic sweep reclaims entries no reader ever touches.
#[derive(Debug)]
pub struct MemoryBackend {
    inner: Mutex<MemoryStore>,
    max_entries: usize,
    stats: Arc<CacheStats>,
}

impl MemoryBackend {
    // == Constructors ==
    /// Creates a backend bounded at `max_entries` with its own statistics.
    pub fn new(max_entries: usize) -> Self {
        Self::with_stats(max_entries, Arc::new(CacheStats::new()))
    }

    /// Creates a backend that records evictions into shared statistics.
    pub fn with_stats(max_entries: usize, stats: Arc<CacheStats>) -> Self {
        Self {
            inner: Mutex::new(MemoryStore::default()),
            max_entries,
            stats,
        }
    }

    // == Sweep Expired ==
    /// Removes all expired entries, returning how many were reclaimed.
    ///
    /// Called by the background sweep task so TTL-expired, never-read keys
    /// do not accumulate.
    pub async fn sweep_expired(&self) -> usize {
        let mut store = self.inner.lock().await;
        let expired: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            store.entries.remove(key);
            store.lru.remove(key);
        }
        expired.len()
    }

    // == Length ==
    /// Current number of physically stored entries (expired ones included
    /// until purged).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}

#[async_trait]
impl crate::cache::CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut store = self.inner.lock().await;
        if store.purge_if_expired(key) {
            return Ok(None);
        }
        match store.entries.get(key) {
            Some(entry) => {
                let value = entry.value.clone();
                store.lru.touch(key);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let mut store = self.inner.lock().await;
        store.purge_if_expired(key);

        let is_overwrite = store.entries.contains_key(key);
        if !is_overwrite && store.entries.len() >= self.max_entries {
            if let Some(evicted) = store.lru.evict_oldest() {
                store.entries.remove(&evicted);
                self.stats.record_eviction();
            } else {
                return Err(CacheError::Backend(
                    "Memory backend is full and eviction failed".to_string(),
                ));
            }
        }

        store
            .entries
            .insert(key.to_string(), StoredEntry::new(value.to_string(), ttl));
        store.lru.touch(key);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<bool> {
        if key.len() > MAX_KEY_LENGTH || value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(
                "Key or value exceeds size limits".to_string(),
            ));
        }

        // Check and insert under one lock acquisition so concurrent claimants
        // cannot both win.
        let mut store = self.inner.lock().await;
        store.purge_if_expired(key);
        if store.entries.contains_key(key) {
            return Ok(false);
        }

        if store.entries.len() >= self.max_entries {
            if let Some(evicted) = store.lru.evict_oldest() {
                store.entries.remove(&evicted);
                self.stats.record_eviction();
            } else {
                return Err(CacheError::Backend(
                    "Memory backend is full and eviction failed".to_string(),
                ));
            }
        }

        store
            .entries
            .insert(key.to_string(), StoredEntry::new(value.to_string(), ttl));
        store.lru.touch(key);
        Ok(true)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut store = self.inner.lock().await;
        let mut removed = 0;
        for key in keys {
            if store.entries.remove(key).is_some() {
                store.lru.remove(key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, keys: &[String]) -> Result<u64> {
        let mut store = self.inner.lock().await;
        let mut present = 0;
        for key in keys {
            store.purge_if_expired(key);
            if store.entries.contains_key(key) {
                present += 1;
            }
        }
        Ok(present)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut store = self.inner.lock().await;
        store.purge_if_expired(key);
        match store.entries.get_mut(key) {
            Some(entry) => {
                entry.set_ttl(seconds);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut store = self.inner.lock().await;
        store.purge_if_expired(key);
        match store.entries.get(key) {
            Some(entry) => match entry.ttl_remaining() {
                Some(secs) => Ok(secs as i64),
                None => Ok(-1),
            },
            None => Ok(-2),
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let store = self.inner.lock().await;
        Ok(store
            .entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn ping(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// == Glob Matching ==
/// Matches `*` (any run) and `?` (any single byte), the subset of glob
/// syntax the clear/scan paths use.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pat = pattern.as_bytes();
    let txt = text.as_bytes();
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star, mut star_t) = (None::<usize>, 0usize);

    while t < txt.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star {
            // Backtrack: let the last '*' absorb one more byte
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }
    p == pat.len()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheBackend;
    use std::time::Duration;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let backend = MemoryBackend::new(100);

        backend.set("key1", "value1", None).await.unwrap();
        let value = backend.get("key1").await.unwrap();

        assert_eq!(value, Some("value1".to_string()));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let backend = MemoryBackend::new(100);
        assert_eq!(backend.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let backend = MemoryBackend::new(100);

        backend.set("key1", "value1", None).await.unwrap();
        backend.set("key1", "value2", None).await.unwrap();

        assert_eq!(backend.get("key1").await.unwrap(), Some("value2".to_string()));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_counts_removed() {
        let backend = MemoryBackend::new(100);

        backend.set("key1", "v", None).await.unwrap();
        backend.set("key2", "v", None).await.unwrap();

        let removed = backend
            .delete(&keys(&["key1", "key2", "missing"]))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(backend.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let backend = MemoryBackend::new(100);

        backend.set("key1", "value1", Some(1)).await.unwrap();
        assert!(backend.get("key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(backend.get("key1").await.unwrap(), None);
        // Expired entry was purged on access
        assert_eq!(backend.len().await, 0);
    }

    #[tokio::test]
    async fn test_ttl_semantics() {
        let backend = MemoryBackend::new(100);

        backend.set("with_ttl", "v", Some(60)).await.unwrap();
        backend.set("no_ttl", "v", None).await.unwrap();

        let remaining = backend.ttl("with_ttl").await.unwrap();
        assert!(remaining > 0 && remaining <= 60);
        assert_eq!(backend.ttl("no_ttl").await.unwrap(), -1);
        assert_eq!(backend.ttl("absent").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_expire_resets_ttl() {
        let backend = MemoryBackend::new(100);

        backend.set("key1", "v", Some(1)).await.unwrap();
        assert!(backend.expire("key1", 60).await.unwrap());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(backend.get("key1").await.unwrap().is_some());

        assert!(!backend.expire("absent", 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_with_huge_ttl_keeps_entry_alive() {
        let backend = MemoryBackend::new(100);

        backend.set("key1", "v", Some(60)).await.unwrap();
        assert!(backend.expire("key1", u64::MAX).await.unwrap());

        assert!(backend.get("key1").await.unwrap().is_some());
        assert!(backend.ttl("key1").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_lru_eviction_bound() {
        let backend = MemoryBackend::new(3);

        backend.set("key1", "v1", None).await.unwrap();
        backend.set("key2", "v2", None).await.unwrap();
        backend.set("key3", "v3", None).await.unwrap();
        backend.set("key4", "v4", None).await.unwrap();

        assert_eq!(backend.len().await, 3);
        assert_eq!(backend.get("key1").await.unwrap(), None);
        assert!(backend.get("key2").await.unwrap().is_some());
        assert!(backend.get("key4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lru_touch_on_get() {
        let backend = MemoryBackend::new(3);

        backend.set("key1", "v1", None).await.unwrap();
        backend.set("key2", "v2", None).await.unwrap();
        backend.set("key3", "v3", None).await.unwrap();

        // Access key1 so key2 becomes the eviction candidate
        backend.get("key1").await.unwrap();
        backend.set("key4", "v4", None).await.unwrap();

        assert!(backend.get("key1").await.unwrap().is_some());
        assert_eq!(backend.get("key2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_eviction_recorded_in_stats() {
        let stats = Arc::new(CacheStats::new());
        let backend = MemoryBackend::with_stats(1, stats.clone());

        backend.set("key1", "v1", None).await.unwrap();
        backend.set("key2", "v2", None).await.unwrap();

        assert_eq!(stats.snapshot().evictions, 1);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let backend = MemoryBackend::new(100);

        assert!(backend.set_if_absent("claim", "a", Some(60)).await.unwrap());
        assert!(!backend.set_if_absent("claim", "b", Some(60)).await.unwrap());
        assert_eq!(backend.get("claim").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_set_if_absent_after_expiry() {
        let backend = MemoryBackend::new(100);

        backend.set_if_absent("claim", "a", Some(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(backend.set_if_absent("claim", "b", Some(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_counts_present() {
        let backend = MemoryBackend::new(100);

        backend.set("key1", "v", None).await.unwrap();
        backend.set("key2", "v", Some(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let count = backend
            .exists(&keys(&["key1", "key2", "missing"]))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let backend = MemoryBackend::new(100);

        backend.set("gone", "v", Some(1)).await.unwrap();
        backend.set("stays", "v", Some(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(backend.sweep_expired().await, 1);
        assert_eq!(backend.len().await, 1);
        assert!(backend.get("stays").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scan_pattern() {
        let backend = MemoryBackend::new(100);

        backend.set("voyage:blog:1", "v", None).await.unwrap();
        backend.set("voyage:blog:2", "v", None).await.unwrap();
        backend.set("voyage:user:1", "v", None).await.unwrap();

        let mut found = backend.scan("voyage:blog:*").await.unwrap();
        found.sort();
        assert_eq!(found, vec!["voyage:blog:1", "voyage:blog:2"]);
    }

    #[tokio::test]
    async fn test_key_too_long() {
        let backend = MemoryBackend::new(100);
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);

        let result = backend.set(&long_key, "v", None).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_value_too_large() {
        let backend = MemoryBackend::new(100);
        let large_value = "x".repeat(MAX_VALUE_SIZE + 1);

        let result = backend.set("key", &large_value, None).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("voyage:*", "voyage:blog:1"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("voyage:?:1", "voyage:a:1"));
        assert!(glob_match("voyage:*:1", "voyage:blog:1"));
        assert!(!glob_match("voyage:*", "other:blog:1"));
        assert!(!glob_match("voyage:?:1", "voyage:ab:1"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }
}
