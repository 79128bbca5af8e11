//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;

/// Configuration for the caching core and the admin server.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote cache URL (e.g. `redis://localhost:6379`); empty disables the remote backend
    pub redis_url: Option<String>,
    /// Prefix prepended to every cache key
    pub key_prefix: String,
    /// Maximum number of entries the in-memory backend can hold
    pub max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Upper bound for any requested TTL in seconds
    pub max_ttl: u64,
    /// Whether oversized payloads are compressed before storage
    pub compression_enabled: bool,
    /// Serialized size in bytes above which payloads are compressed
    pub compression_threshold: usize,
    /// Maximum number of per-key coalescing locks kept alive
    pub max_locks: usize,
    /// Batch size for namespace clears against the backend
    pub clear_batch_size: usize,
    /// Expired-entry sweep interval in seconds for the in-memory backend
    pub cleanup_interval: u64,
    /// Lifetime in seconds of idempotency records
    pub idempotency_ttl: u64,
    /// Retry-After hint in seconds returned on duplicate in-flight requests
    pub retry_after: u64,
    /// HTTP admin server port
    pub server_port: u16,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Remote cache URL; unset or empty falls back to memory only
    /// - `KEY_PREFIX` - Cache key prefix (default: "voyage")
    /// - `MAX_ENTRIES` - Maximum in-memory entries (default: 10000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `MAX_TTL` - Maximum TTL in seconds (default: 86400)
    /// - `COMPRESSION_ENABLED` - Compress oversized payloads (default: true)
    /// - `COMPRESSION_THRESHOLD` - Compression threshold in bytes (default: 1024)
    /// - `MAX_LOCKS` - Coalescing lock table bound (default: 1024)
    /// - `CLEAR_BATCH_SIZE` - Batched clear size (default: 500)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 30)
    /// - `IDEMPOTENCY_TTL` - Idempotency record lifetime in seconds (default: 3600)
    /// - `RETRY_AFTER` - Retry-After hint in seconds (default: 5)
    /// - `SERVER_PORT` - HTTP admin server port (default: 3000)
    pub fn from_env() -> Self {
        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.is_empty());
        Self {
            redis_url,
            key_prefix: env::var("KEY_PREFIX").unwrap_or_else(|_| "voyage".to_string()),
            max_entries: env_parse("MAX_ENTRIES", 10_000),
            default_ttl: env_parse("DEFAULT_TTL", 300),
            max_ttl: env_parse("MAX_TTL", 86_400),
            compression_enabled: env_bool("COMPRESSION_ENABLED", true),
            compression_threshold: env_parse("COMPRESSION_THRESHOLD", 1024),
            max_locks: env_parse("MAX_LOCKS", 1024),
            clear_batch_size: env_parse("CLEAR_BATCH_SIZE", 500),
            cleanup_interval: env_parse("CLEANUP_INTERVAL", 30),
            idempotency_ttl: env_parse("IDEMPOTENCY_TTL", 3600),
            retry_after: env_parse("RETRY_AFTER", 5),
            server_port: env_parse("SERVER_PORT", 3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "voyage".to_string(),
            max_entries: 10_000,
            default_ttl: 300,
            max_ttl: 86_400,
            compression_enabled: true,
            compression_threshold: 1024,
            max_locks: 1024,
            clear_batch_size: 500,
            cleanup_interval: 30,
            idempotency_ttl: 3600,
            retry_after: 5,
            server_port: 3000,
        }
    }
}
