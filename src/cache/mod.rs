//! Cache Module
//!
//! Dual-backend caching with TTL expiration, LRU eviction, payload
//! compression and per-key request coalescing.

mod backend;
pub mod codec;
mod entry;
mod locks;
mod lru;
mod manager;
mod memory;
mod remote;
mod stats;


// Re-export public types
pub use backend::CacheBackend;
pub use entry::{current_timestamp_ms, Envelope, StoredEntry};
pub use locks::KeyLocks;
pub use lru::LruTracker;
pub use manager::CacheManager;
pub use memory::MemoryBackend;
pub use remote::RemoteBackend;
pub use stats::{CacheStats, StatsSnapshot};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
