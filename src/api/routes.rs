//! API Routes
//!
//! Configures the Axum router with the admin endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, get_handler, health_handler, idempotency_metrics_handler,
    set_handler, stats_handler, stats_reset_handler, use_memory_handler, use_remote_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Backend liveness and active backend name
/// - `GET /stats` - Cache statistics snapshot
/// - `POST /stats/reset` - Zero the statistics counters
/// - `GET /cache/:key` - Retrieve a value (optional `?namespace=`)
/// - `PUT /cache` - Store a value
/// - `DELETE /cache/:key` - Delete a key (optional `?namespace=`)
/// - `POST /cache/clear` - Clear a namespace or the whole prefix
/// - `POST /backend/memory` - Switch to the in-memory backend
/// - `POST /backend/remote` - Switch back to the remote backend
/// - `GET /idempotency/metrics` - Idempotency counters snapshot
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/reset", post(stats_reset_handler))
        .route("/cache/:key", get(get_handler).delete(delete_handler))
        .route("/cache", put(set_handler))
        .route("/cache/clear", post(clear_handler))
        .route("/backend/memory", post(use_memory_handler))
        .route("/backend/remote", post(use_remote_handler))
        .route("/idempotency/metrics", get(idempotency_metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
