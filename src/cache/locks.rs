//! Key Lock Table Module
//!
//! Bounded table of per-key async mutexes used by `get_or_set` to coalesce
//! concurrent producers ("singleflight"). The table is LRU-bounded so
//! unbounded key cardinality cannot grow it without limit, and eviction only
//! removes locks with no current holders or waiters.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex as AsyncMutex;

use crate::cache::LruTracker;

// == Lock Table ==
#[derive(Debug, Default)]
struct LockTable {
    locks: HashMap<String, Arc<AsyncMutex<()>>>,
    lru: LruTracker,
}

/// Bounded map of key → async mutex.
///
/// A lock is evictable only while the table holds the sole `Arc` reference
/// (`strong_count == 1`): any task currently holding or awaiting the mutex
/// also holds an `Arc` clone, so in-use locks are never removed from under
/// a waiter. When every lock is referenced the table may transiently exceed
/// the bound rather than break that invariant.
#[derive(Debug)]
pub struct KeyLocks {
    max_locks: usize,
    inner: StdMutex<LockTable>,
}

impl KeyLocks {
    // == Constructor ==
    pub fn new(max_locks: usize) -> Self {
        Self {
            max_locks,
            inner: StdMutex::new(LockTable::default()),
        }
    }

    // == Acquire ==
    /// Returns the lock for `key`, creating it if absent.
    ///
    /// The returned `Arc` keeps the lock alive independently of table
    /// eviction; callers lock it with `.lock().await`.
    pub fn acquire(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let lock = table
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        table.lru.touch(key);

        // Shed least-recently-used unreferenced locks over the bound. The
        // just-acquired lock has two references and is never a candidate.
        let LockTable { locks, lru } = &mut *table;
        while locks.len() > self.max_locks {
            let evicted = lru.evict_oldest_where(|k| {
                locks.get(k).map_or(true, |l| Arc::strong_count(l) == 1)
            });
            match evicted {
                Some(k) => {
                    locks.remove(&k);
                }
                // Every remaining lock is held or awaited; stop rather than
                // evict one out from under a waiter.
                None => break,
            }
        }

        lock
    }

    // == Length ==
    /// Number of locks currently tracked.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .locks
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
