//! Payload Codec Module
//!
//! Serialize → (optionally compress) pipeline applied above the backends.
//! Payloads travel as an [`Envelope`] in JSON form; compressed values are
//! gzip output carried as base64 so the envelope stays valid JSON.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::Envelope;
use crate::error::{CacheError, Result};

// == Encode ==
/// Serializes `value` and wraps it in an envelope, compressing when the
/// serialized form reaches `threshold` bytes and compression is enabled.
pub fn encode<T: Serialize + ?Sized>(
    value: &T,
    compression_enabled: bool,
    threshold: usize,
) -> Result<String> {
    let serialized = serde_json::to_string(value)
        .map_err(|e| CacheError::InvalidRequest(format!("Value is not serializable: {}", e)))?;

    let envelope = if compression_enabled && serialized.len() >= threshold {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(serialized.as_bytes())
            .and_then(|_| encoder.finish())
            .map(|compressed| Envelope::compressed(BASE64_STANDARD.encode(compressed)))
            .map_err(|e| CacheError::Backend(format!("Compression failed: {}", e)))?
    } else {
        Envelope::plain(serialized)
    };

    serde_json::to_string(&envelope)
        .map_err(|e| CacheError::Backend(format!("Envelope encoding failed: {}", e)))
}

// == Decode ==
/// Reverses [`encode`]: parses the envelope, decompresses if tagged, and
/// deserializes into `T`. Any failure is a deserialization error; callers
/// treat the entry as corrupt.
pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T> {
    let envelope: Envelope = serde_json::from_str(payload)
        .map_err(|e| CacheError::Deserialization(format!("Invalid envelope: {}", e)))?;

    let serialized = if envelope.compressed {
        let compressed = BASE64_STANDARD
            .decode(envelope.value.as_bytes())
            .map_err(|e| CacheError::Deserialization(format!("Invalid base64 payload: {}", e)))?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut out = String::new();
        decoder
            .read_to_string(&mut out)
            .map_err(|e| CacheError::Deserialization(format!("Decompression failed: {}", e)))?;
        out
    } else {
        envelope.value
    };

    serde_json::from_str(&serialized)
        .map_err(|e| CacheError::Deserialization(format!("Invalid cached value: {}", e)))
}
