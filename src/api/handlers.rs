//! API Handlers
//!
//! HTTP request handlers for the admin endpoints. All cache semantics live
//! in the managers; handlers translate HTTP to manager calls and back.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::cache::{CacheManager, StatsSnapshot};
use crate::error::{CacheError, Result};
use crate::idempotency::{IdempotencyManager, IdempotencyMetricsSnapshot};
use crate::models::{
    ClearRequest, ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest,
    SetResponse, SwitchResponse,
};

// == Application State ==
/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub idempotency: Arc<IdempotencyManager>,
}

impl AppState {
    pub fn new(cache: Arc<CacheManager>, idempotency: Arc<IdempotencyManager>) -> Self {
        Self { cache, idempotency }
    }
}

/// Optional `?namespace=` query on key-addressed routes.
#[derive(Debug, Default, Deserialize)]
pub struct NamespaceQuery {
    pub namespace: Option<String>,
}

// == Cache Handlers ==
/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Json<GetResponse>> {
    let value: Option<serde_json::Value> = state
        .cache
        .get(&key, query.namespace.as_deref())
        .await?;

    match value {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state
        .cache
        .set(&req.key, &req.value, req.ttl, req.namespace.as_deref())
        .await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state
        .cache
        .delete(&[&key], query.namespace.as_deref())
        .await?;

    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for POST /cache/clear
pub async fn clear_handler(
    State(state): State<AppState>,
    Json(req): Json<ClearRequest>,
) -> Result<Json<ClearResponse>> {
    let cleared = state.cache.clear(req.namespace.as_deref()).await?;

    Ok(Json(ClearResponse {
        cleared,
        namespace: req.namespace,
    }))
}

// == Backend Handlers ==
/// Handler for POST /backend/memory
pub async fn use_memory_handler(State(state): State<AppState>) -> Json<SwitchResponse> {
    let switched = state.cache.use_memory_backend().await;
    Json(SwitchResponse {
        active_backend: "memory".to_string(),
        switched,
    })
}

/// Handler for POST /backend/remote
pub async fn use_remote_handler(State(state): State<AppState>) -> Result<Json<SwitchResponse>> {
    let switched = state.cache.use_remote_backend().await?;
    Ok(Json(SwitchResponse {
        active_backend: "remote".to_string(),
        switched,
    }))
}

// == Observability Handlers ==
/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.cache.get_statistics())
}

/// Handler for POST /stats/reset
pub async fn stats_reset_handler(State(state): State<AppState>) -> StatusCode {
    state.cache.reset_statistics();
    StatusCode::NO_CONTENT
}

/// Handler for GET /idempotency/metrics
pub async fn idempotency_metrics_handler(
    State(state): State<AppState>,
) -> Json<IdempotencyMetricsSnapshot> {
    Json(state.idempotency.get_metrics())
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_up = state.cache.ping().await;
    let active = state.cache.active_backend().await;
    Json(HealthResponse::new(backend_up, active))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use crate::config::Config;
    use serde_json::json;

    fn test_state() -> AppState {
        let cache = Arc::new(CacheManager::memory_only(&Config::default()));
        let idempotency = Arc::new(IdempotencyManager::new(
            Arc::new(MemoryBackend::new(1000)),
            3600,
            5,
        ));
        AppState::new(cache, idempotency)
    }

    fn set_request(key: &str, value: serde_json::Value) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl: None,
            namespace: None,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let result = set_handler(
            State(state.clone()),
            Json(set_request("test_key", json!({"n": 1}))),
        )
        .await;
        assert!(result.is_ok());

        let result = get_handler(
            State(state),
            Path("test_key".to_string()),
            Query(NamespaceQuery::default()),
        )
        .await;
        assert_eq!(result.unwrap().value, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key_is_not_found() {
        let state = test_state();

        let result = get_handler(
            State(state),
            Path("nonexistent".to_string()),
            Query(NamespaceQuery::default()),
        )
        .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let result = set_handler(State(state), Json(set_request("", json!("v")))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_handler_reports_count() {
        let state = test_state();
        set_handler(
            State(state.clone()),
            Json(set_request("to_delete", json!("v"))),
        )
        .await
        .unwrap();

        let result = delete_handler(
            State(state.clone()),
            Path("to_delete".to_string()),
            Query(NamespaceQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(result.deleted, 1);

        let again = delete_handler(
            State(state),
            Path("to_delete".to_string()),
            Query(NamespaceQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(again.deleted, 0);
    }

    #[tokio::test]
    async fn test_clear_handler_scoped() {
        let state = test_state();
        state
            .cache
            .set("k", "v", None, Some("blog"))
            .await
            .unwrap();
        state
            .cache
            .set("k", "v", None, Some("users"))
            .await
            .unwrap();

        let result = clear_handler(
            State(state.clone()),
            Json(ClearRequest {
                namespace: Some("blog".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(result.cleared, 1);

        let users: Option<String> = state.cache.get("k", Some("users")).await.unwrap();
        assert_eq!(users, Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_backend_switch_handlers() {
        let state = test_state();

        // Memory is already active
        let result = use_memory_handler(State(state.clone())).await;
        assert!(!result.switched);

        // No remote configured in the memory-only manager
        let result = use_remote_handler(State(state)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stats_handler_and_reset() {
        let state = test_state();
        state.cache.set("k", "v", None, None).await.unwrap();

        let stats = stats_handler(State(state.clone())).await;
        assert_eq!(stats.sets, 1);

        let code = stats_reset_handler(State(state.clone())).await;
        assert_eq!(code, StatusCode::NO_CONTENT);
        assert_eq!(stats_handler(State(state)).await.sets, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let state = test_state();

        let health = health_handler(State(state)).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.active_backend, "memory");
    }

    #[tokio::test]
    async fn test_idempotency_metrics_handler() {
        let state = test_state();
        state
            .idempotency
            .check_and_set_processing("reg", "k")
            .await
            .unwrap();

        let metrics = idempotency_metrics_handler(State(state)).await;
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.misses, 1);
    }
}
