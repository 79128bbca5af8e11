//! Voyage Cache - dual-backend caching and request deduplication
//!
//! Remote-first cache with in-memory fallback, payload compression,
//! per-key request coalescing, and idempotency-key deduplication for
//! mutation endpoints.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod models;
pub mod ops;
pub mod tasks;

pub use api::{create_router, AppState, IdempotencyKey};
pub use cache::CacheManager;
pub use config::Config;
pub use error::{CacheError, IdempotencyError};
pub use idempotency::IdempotencyManager;
pub use tasks::spawn_sweep_task;
