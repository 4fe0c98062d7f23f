//! HTTP API tests
//!
//! Requests go straight into the router with `tower::ServiceExt::oneshot`;
//! no socket is involved except in the shutdown test.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use waitroom_core::health::{ComponentHealth, HealthChecker, QUEUE_STORE_COMPONENT};
use waitroom_core::shutdown::ShutdownCoordinator;
use waitroom_core::test_utils::{assert_completes_within, dyn_memory_engine, DEFAULT_TEST_TIMEOUT};
use waitroom_server::types::*;
use waitroom_server::{build_router, AppState, WaitroomServer};

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(dyn_memory_engine(), Arc::new(HealthChecker::new("test"))))
}

async fn send(router: &Router, method: &str, uri: &str) -> Response {
    let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_register_returns_rank() {
    let router = build_router(test_state());

    let first = send(&router, "POST", "/api/v1/queue?user_id=1").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(json::<RegisterUserResponse>(first).await.rank, 1);

    let second = send(&router, "POST", "/api/v1/queue?queue=default&user_id=2").await;
    assert_eq!(json::<RegisterUserResponse>(second).await.rank, 2);

    let other = send(&router, "POST", "/api/v1/queue?queue=concert&user_id=2").await;
    assert_eq!(json::<RegisterUserResponse>(other).await.rank, 1);
}

#[tokio::test]
async fn test_duplicate_registration_is_conflict() {
    let router = build_router(test_state());
    send(&router, "POST", "/api/v1/queue?user_id=7").await;

    let response = send(&router, "POST", "/api/v1/queue?user_id=7").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: ErrorResponse = json(response).await;
    assert_eq!(body.code, "AlreadyRegistered");
    assert!(body.reason.contains('7'));
}

#[tokio::test]
async fn test_allow_and_rank() {
    let router = build_router(test_state());
    for user in 1..=5 {
        send(&router, "POST", &format!("/api/v1/queue?user_id={}", user)).await;
    }

    let response = send(&router, "POST", "/api/v1/queue/allow?count=3").await;
    let body: AllowUserResponse = json(response).await;
    assert_eq!(body.requested_count, 3);
    assert_eq!(body.allowed_count, 3);

    let rank: RankNumberResponse = json(send(&router, "GET", "/api/v1/queue/rank?user_id=4").await).await;
    assert_eq!(rank.rank, 1);
    let rank: RankNumberResponse = json(send(&router, "GET", "/api/v1/queue/rank?user_id=1").await).await;
    assert_eq!(rank.rank, -1);
    let rank: RankNumberResponse = json(send(&router, "GET", "/api/v1/queue/rank?user_id=99").await).await;
    assert_eq!(rank.rank, -1);

    // More than are waiting
    let body: AllowUserResponse = json(send(&router, "POST", "/api/v1/queue/allow?count=10").await).await;
    assert_eq!(body.requested_count, 10);
    assert_eq!(body.allowed_count, 2);
}

#[tokio::test]
async fn test_touch_sets_token_cookie() {
    let router = build_router(test_state());

    let response = send(&router, "GET", "/api/v1/queue/touch?user_id=42").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    let token = text(response).await;

    assert_eq!(token, "cbd7a411a4a151308aa4690d13440df06b97d8a156fa822880c4a11f54ccb34f");
    assert!(cookie.starts_with(&format!("user-queue-default-token={}", token)));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=300"));
}

#[tokio::test]
async fn test_allowed_with_token() {
    let router = build_router(test_state());
    send(&router, "POST", "/api/v1/queue?queue=concert&user_id=42").await;
    let token = text(send(&router, "GET", "/api/v1/queue/touch?queue=concert&user_id=42").await).await;

    let uri = format!("/api/v1/queue/allowed?queue=concert&user_id=42&token={}", token);
    let body: AllowedUserResponse = json(send(&router, "GET", &uri).await).await;
    assert!(!body.allowed);

    send(&router, "POST", "/api/v1/queue/allow?queue=concert&count=1").await;
    let body: AllowedUserResponse = json(send(&router, "GET", &uri).await).await;
    assert!(body.allowed);
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let router = build_router(test_state());
    send(&router, "POST", "/api/v1/queue?user_id=42").await;
    send(&router, "POST", "/api/v1/queue/allow?count=1").await;

    let response = send(&router, "GET", "/api/v1/queue/allowed?user_id=42&token=deadbeef").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json::<ErrorResponse>(response).await.code, "TokenMismatch");
}

#[tokio::test]
async fn test_missing_parameters_are_rejected() {
    let router = build_router(test_state());

    assert_eq!(send(&router, "POST", "/api/v1/queue").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(send(&router, "POST", "/api/v1/queue/allow").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        send(&router, "POST", "/api/v1/queue/allow?count=-1").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        send(&router, "GET", "/api/v1/queue/allowed?user_id=1").await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_health() {
    let state = test_state();
    state.health.register_component(QUEUE_STORE_COMPONENT).await;
    let router = build_router(state);

    let response = send(&router, "GET", "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"][0]["name"], QUEUE_STORE_COMPONENT);
}

#[tokio::test]
async fn test_ready_follows_recorded_health() {
    let state = test_state();
    state.health.register_component(QUEUE_STORE_COMPONENT).await;
    let router = build_router(state.clone());

    assert_eq!(send(&router, "GET", "/ready").await.status(), StatusCode::OK);

    state.health.record(ComponentHealth::unhealthy(QUEUE_STORE_COMPONENT, "scan failed")).await;
    assert_eq!(send(&router, "GET", "/ready").await.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let coordinator = Arc::new(ShutdownCoordinator::new(Duration::ZERO));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

    let server = tokio::spawn(WaitroomServer::new(test_state(), coordinator.clone()).serve(listener));

    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator.shutdown().await;

    assert_completes_within(DEFAULT_TEST_TIMEOUT, server).await.unwrap().unwrap();
}
