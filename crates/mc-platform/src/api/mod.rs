//! API Layer
//!
//! REST endpoints for the dashboard UI: session login, Mailchimp account
//! connection, the read-only Mailchimp proxy and health probes.

pub mod common;
pub mod middleware;

pub mod auth;
pub mod health;
pub mod mailchimp;
pub mod mailchimp_oauth;
pub mod openapi;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use auth::{auth_router, LoginStateStore};
pub use common::*;
pub use health::{health_router, probes_router};
pub use mailchimp::mailchimp_router;
pub use mailchimp_oauth::mailchimp_oauth_router;
pub use middleware::{AppState, Authenticated, Connected, SessionSettings};
pub use openapi::DashboardApiDoc;

/// Every dashboard route plus the OpenAPI document and Swagger UI.
/// Transport layers (CORS, tracing) are added by the binary.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth/mailchimp", mailchimp_oauth_router())
        .nest("/api/auth", auth_router())
        .nest("/api/mailchimp", mailchimp_router())
        .nest("/api/health", health_router())
        .nest("/health", probes_router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", DashboardApiDoc::openapi()))
        .with_state(state)
}
