//! Health API
//!
//! Liveness and readiness probes plus the dependency checks the settings
//! page shows (identity provider, connection store, Mailchimp).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use mc_common::{ApiFailure, ApiResponse, ErrorCode, HealthReport, HealthStatus};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::common::ok;
use crate::api::middleware::{AppState, Authenticated};

/// Basic liveness payload
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BasicHealth {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl BasicHealth {
    fn up() -> Self {
        Self {
            status: HealthStatus::Up,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// 200 with the report when every check passed, otherwise a 503 failure
/// envelope that still carries the report as `data`
fn report_response(report: HealthReport) -> Response {
    if report.is_up() {
        return (StatusCode::OK, ok(report)).into_response();
    }

    let failing: Vec<&str> = report.failing_checks().collect();
    let failure = ApiFailure::new(
        format!("Unhealthy: {}", failing.join(", ")),
        ErrorCode::ServiceUnavailable,
        StatusCode::SERVICE_UNAVAILABLE.as_u16(),
    );
    let body = ApiResponse::failure(failure).with_data(report);
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses((status = 200, description = "Service is running", body = BasicHealth))
)]
pub async fn health() -> Json<BasicHealth> {
    Json(BasicHealth::up())
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses((status = 200, description = "Process is alive", body = BasicHealth))
)]
pub async fn live() -> Json<BasicHealth> {
    Json(BasicHealth::up())
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Connection store reachable", body = HealthReport),
        (status = 503, description = "Connection store unavailable", body = HealthReport)
    )
)]
pub async fn ready(State(state): State<AppState>) -> Response {
    report_response(state.health.readiness().await)
}

#[utoipa::path(
    get,
    path = "/api/health/auth",
    tag = "health",
    responses(
        (status = 200, description = "Identity provider and connection store healthy", body = HealthReport),
        (status = 503, description = "At least one check failed", body = HealthReport)
    )
)]
pub async fn auth_health(State(state): State<AppState>) -> Response {
    report_response(state.health.auth().await)
}

#[utoipa::path(
    get,
    path = "/api/health/mailchimp",
    tag = "health",
    responses(
        (status = 200, description = "Mailchimp reachable with the stored token", body = HealthReport),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Mailchimp unreachable or token rejected", body = HealthReport)
    )
)]
pub async fn mailchimp_health(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Response {
    report_response(state.health.mailchimp(&user.user_id).await)
}

/// `/api/health/*` routes
pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/auth", get(auth_health))
        .route("/mailchimp", get(mailchimp_health))
}

/// Kubernetes-style probes at `/health/*`
pub fn probes_router() -> Router<AppState> {
    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready))
}
