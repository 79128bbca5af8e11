//! LRU Tracker Module
//!
//! Implements least-recently-used ordering, shared by the in-memory
//! backend (entry eviction) and the lock table (lock eviction).

use std::collections::VecDeque;

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Order of keys by access time
    order: VecDeque<String>,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as recently used (moves to front).
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key, or None if empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    // == Evict Oldest Matching ==
    /// Returns and removes the least recently used key satisfying `pred`.
    ///
    /// Keys rejected by the predicate keep their position. Used by the lock
    /// table, which must never evict a lock that still has holders or waiters.
    pub fn evict_oldest_where<F>(&mut self, pred: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        let idx = self.order.iter().rposition(|k| pred(k))?;
        self.order.remove(idx)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.back()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_new() {
        let lru = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_lru_touch_new_key() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.touch("key3");

        assert_eq!(lru.len(), 3);
        // key1 is oldest (added first)
        assert_eq!(lru.peek_oldest(), Some(&"key1".to_string()));
    }

    #[test]
    fn test_lru_touch_existing_key_moves_to_front() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.touch("key3");
        lru.touch("key1");

        assert_eq!(lru.len(), 3);
        // key2 is now oldest
        assert_eq!(lru.peek_oldest(), Some(&"key2".to_string()));
    }

    #[test]
    fn test_lru_evict_oldest() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");

        assert_eq!(lru.evict_oldest(), Some("key1".to_string()));
        assert_eq!(lru.evict_oldest(), Some("key2".to_string()));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.touch("key3");
        lru.remove("key2");

        assert_eq!(lru.len(), 2);
        assert!(!lru.contains("key2"));
        assert!(lru.contains("key1"));
        assert!(lru.contains("key3"));
    }

    #[test]
    fn test_lru_remove_nonexistent_key() {
        let mut lru = LruTracker::new();
        lru.touch("key1");
        lru.remove("nonexistent");
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_lru_evict_oldest_where_skips_rejected() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.touch("c");

        // "a" is oldest, but the predicate rejects it
        let evicted = lru.evict_oldest_where(|k| k != "a");
        assert_eq!(evicted, Some("b".to_string()));

        // "a" keeps its place at the back
        assert_eq!(lru.peek_oldest(), Some(&"a".to_string()));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_lru_evict_oldest_where_none_match() {
        let mut lru = LruTracker::new();
        lru.touch("a");
        lru.touch("b");

        assert_eq!(lru.evict_oldest_where(|_| false), None);
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.touch("c");
        lru.touch("a");
        lru.touch("c");
        lru.touch("b");

        // Order front-to-back is now [b, c, a]
        assert_eq!(lru.evict_oldest(), Some("a".to_string()));
        assert_eq!(lru.evict_oldest(), Some("c".to_string()));
        assert_eq!(lru.evict_oldest(), Some("b".to_string()));
    }
}
