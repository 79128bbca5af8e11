//! Idempotency-Key Extractor
//!
//! Axum extractor that pulls the `Idempotency-Key` header from a request
//! and validates it as a UUID. Mutation handlers take this as an argument;
//! requests without a usable key are rejected before the handler runs.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::IdempotencyError;

/// Name of the header carrying the client-chosen request key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// A validated `Idempotency-Key` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyKey(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = IdempotencyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .ok_or(IdempotencyError::MissingKey)?;

        let raw = raw
            .to_str()
            .map_err(|_| IdempotencyError::InvalidKey("Header is not valid UTF-8".to_string()))?;

        let uuid = Uuid::parse_str(raw).map_err(|_| {
            IdempotencyError::InvalidKey(format!("'{}' is not a valid UUID", raw))
        })?;

        Ok(IdempotencyKey(uuid))
    }
}
