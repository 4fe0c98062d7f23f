//! HTTP handlers for the queue API

use crate::error::ServerResult;
use crate::state::AppState;
use crate::types::*;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;
use waitroom_core::health::{checks, HealthCheck};

// ============================================================================
// Queue Handlers
// ============================================================================

/// POST /api/v1/queue - Put a user at the back of the wait set
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ServerResult<Json<RegisterUserResponse>> {
    let rank = state.engine.register(&query.queue, query.user_id).await?;
    Ok(Json(RegisterUserResponse { rank: rank.as_i64() }))
}

/// POST /api/v1/queue/allow - Promote up to `count` waiting users
pub async fn allow_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AllowQuery>,
) -> ServerResult<Json<AllowUserResponse>> {
    let count = usize::try_from(query.count).unwrap_or(usize::MAX);
    let allowed = state.engine.admit(&query.queue, count).await?;

    Ok(Json(AllowUserResponse { requested_count: query.count, allowed_count: allowed as u64 }))
}

/// GET /api/v1/queue/allowed - Whether a token-bearing user has been admitted
pub async fn is_allowed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AllowedQuery>,
) -> ServerResult<Json<AllowedUserResponse>> {
    let allowed =
        state.engine.is_admitted_with_token(&query.queue, query.user_id, &query.token).await?;
    Ok(Json(AllowedUserResponse { allowed }))
}

/// GET /api/v1/queue/rank - One-based wait position, or -1
pub async fn get_rank(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ServerResult<Json<RankNumberResponse>> {
    let rank = state.engine.wait_rank(&query.queue, query.user_id).await?;
    Ok(Json(RankNumberResponse { rank: rank.as_i64() }))
}

/// GET /api/v1/queue/touch - Issue the user's token, in the body and as a cookie
pub async fn touch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
    jar: CookieJar,
) -> (CookieJar, String) {
    let token = state.engine.issue_token(&query.queue, query.user_id).into_string();

    let max_age = i64::try_from(state.cookie_max_age.as_secs()).unwrap_or(i64::MAX);
    let cookie = Cookie::build((state.engine.token_issuer().cookie_name(&query.queue), token.clone()))
        .path("/")
        .max_age(time::Duration::seconds(max_age));

    (jar.add(cookie), token)
}

// ============================================================================
// Health
// ============================================================================

/// GET /health - Probe the store and report component health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthCheck>) {
    let store = checks::check_store(state.engine.store().as_ref(), state.health_timeout).await;
    state.health.record(store).await;

    let report = state.health.check_health().await;
    let status = StatusCode::from_u16(report.status.to_http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json(report))
}

/// GET /ready - 200 unless a component is unhealthy, based on the last recorded state
pub async fn ready(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.health.readiness_check().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
