//! Cache Entry Module
//!
//! Defines the in-memory entry with TTL support and the serialization
//! envelope shared by both backends.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Stored Entry ==
/// A single in-memory cache entry: payload plus expiry metadata.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// The stored payload (an [`Envelope`] in JSON form)
    pub value: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates a new entry with optional TTL in seconds.
    ///
    /// Oversized TTLs saturate at the far end of the clock rather than wrap.
    pub fn new(value: String, ttl_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_seconds.map(|ttl| now.saturating_add(ttl.saturating_mul(1000)));

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches the expiration time.
    /// Expired entries are logically absent even while physically stored.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Remaining TTL in seconds: `Some(0)` if expired, `None` if no expiry set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            if expires > now {
                (expires - now) / 1000
            } else {
                0
            }
        })
    }

    /// Resets the expiry to `seconds` from now, saturating on overflow.
    pub fn set_ttl(&mut self, seconds: u64) {
        self.expires_at = Some(current_timestamp_ms().saturating_add(seconds.saturating_mul(1000)));
    }
}

// == Envelope ==
/// Wire format for cached payloads, identical on both backends:
/// `{ "value": <string>, "compressed": bool }`.
///
/// When `compressed` is set, `value` holds base64-encoded gzip output;
/// otherwise it holds the serialized value itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub value: String,
    pub compressed: bool,
}

impl Envelope {
    /// Wraps an uncompressed serialized value.
    pub fn plain(value: String) -> Self {
        Self {
            value,
            compressed: false,
        }
    }

    /// Wraps a base64-encoded compressed payload.
    pub fn compressed(value: String) -> Self {
        Self {
            value,
            compressed: true,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
