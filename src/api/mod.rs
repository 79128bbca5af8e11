//! API Module
//!
//! Admin HTTP surface: route table, request handlers, and the
//! `Idempotency-Key` header extractor used by mutation endpoints.

pub mod extract;
pub mod handlers;
pub mod routes;

pub use extract::IdempotencyKey;
pub use handlers::AppState;
pub use routes::create_router;
