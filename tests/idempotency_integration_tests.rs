//! Integration Tests for Idempotent Mutations
//!
//! Drives a registration endpoint protected by the `Idempotency-Key`
//! header through the full duplicate-request lifecycle: first execution,
//! in-flight conflict, and replay after completion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;
use voyage_cache::{cache::MemoryBackend, ops, IdempotencyError, IdempotencyKey, IdempotencyManager};

// == Demo Registration Endpoint ==

#[derive(Debug, Clone, Deserialize)]
struct RegisterRequest {
    email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct RegisteredUser {
    user_id: u64,
    email: String,
}

#[derive(Clone)]
struct RegisterState {
    idempotency: Arc<IdempotencyManager>,
    users_created: Arc<AtomicUsize>,
    handler_delay: Duration,
}

async fn register_handler(
    State(state): State<RegisterState>,
    key: IdempotencyKey,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>), IdempotencyError> {
    let users = state.users_created.clone();
    let delay = state.handler_delay;

    let user = ops::idempotent(&state.idempotency, "register", &key.0, || async move {
        tokio::time::sleep(delay).await;
        let user_id = users.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok::<_, IdempotencyError>(RegisteredUser {
            user_id,
            email: req.email,
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

fn create_register_app(handler_delay: Duration) -> (Router, Arc<AtomicUsize>) {
    let users_created = Arc::new(AtomicUsize::new(0));
    let state = RegisterState {
        idempotency: Arc::new(IdempotencyManager::new(
            Arc::new(MemoryBackend::new(1000)),
            3600,
            5,
        )),
        users_created: users_created.clone(),
        handler_delay,
    };
    let app = Router::new()
        .route("/register", post(register_handler))
        .with_state(state);
    (app, users_created)
}

fn register_request(key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/register")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("Idempotency-Key", key);
    }
    builder
        .body(Body::from(r#"{"email":"ada@example.com"}"#))
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == Lifecycle Tests ==

#[tokio::test]
async fn test_first_request_creates_user() {
    let (app, users_created) = create_register_app(Duration::ZERO);
    let key = Uuid::new_v4().to_string();

    let response = app.oneshot(register_request(Some(&key))).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["user_id"], 1);
    assert_eq!(json["email"], "ada@example.com");
    assert_eq!(users_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_duplicate_while_in_flight_conflicts() {
    let (app, users_created) = create_register_app(Duration::from_millis(200));
    let key = Uuid::new_v4().to_string();

    let first_app = app.clone();
    let first_key = key.clone();
    let first = tokio::spawn(async move {
        first_app
            .oneshot(register_request(Some(&first_key)))
            .await
            .unwrap()
    });

    // Let the first request claim the key, then fire the duplicate
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = app.oneshot(register_request(Some(&key))).await.unwrap();

    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(
        second.headers().get("retry-after").unwrap().to_str().unwrap(),
        "5"
    );
    let json = body_to_json(second.into_body()).await;
    assert_eq!(json["code"], "duplicate_request");
    assert_eq!(json["idempotency_key"], key);
    assert_eq!(json["retry_after"], 5);

    // The original request still completes normally
    let first = first.await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(users_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_replay_after_completion_returns_original_response() {
    let (app, users_created) = create_register_app(Duration::ZERO);
    let key = Uuid::new_v4().to_string();

    let first = app
        .clone()
        .oneshot(register_request(Some(&key)))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body = body_to_json(first.into_body()).await;

    // Retransmissions replay the stored response; the handler never reruns
    for _ in 0..3 {
        let replay = app
            .clone()
            .oneshot(register_request(Some(&key)))
            .await
            .unwrap();
        assert_eq!(replay.status(), StatusCode::CREATED);
        let replay_body = body_to_json(replay.into_body()).await;
        assert_eq!(replay_body, first_body);
    }

    assert_eq!(users_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_distinct_keys_create_distinct_users() {
    let (app, users_created) = create_register_app(Duration::ZERO);

    for expected_id in 1..=3u64 {
        let key = Uuid::new_v4().to_string();
        let response = app
            .clone()
            .oneshot(register_request(Some(&key)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["user_id"], expected_id);
    }

    assert_eq!(users_created.load(Ordering::SeqCst), 3);
}

// == Header Validation Tests ==

#[tokio::test]
async fn test_missing_idempotency_key_is_rejected() {
    let (app, users_created) = create_register_app(Duration::ZERO);

    let response = app.oneshot(register_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "missing_idempotency_key");
    assert_eq!(users_created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_idempotency_key_is_rejected() {
    let (app, users_created) = create_register_app(Duration::ZERO);

    let response = app
        .oneshot(register_request(Some("not-a-uuid")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "invalid_idempotency_key");
    assert_eq!(users_created.load(Ordering::SeqCst), 0);
}
