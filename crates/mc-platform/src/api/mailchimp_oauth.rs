//! Mailchimp connection endpoints
//!
//! - GET /api/auth/mailchimp/authorize - Redirect to Mailchimp's consent page
//! - GET /api/auth/mailchimp/callback - Store the connection, back to settings
//! - GET /api/auth/mailchimp/status - Connection status for the settings page
//! - POST /api/auth/mailchimp/disconnect - Forget the stored token

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::{IntoParams, ToSchema};

use crate::api::common::{ok, ApiResult};
use crate::api::middleware::{AppState, Authenticated};
use crate::domain::ConnectionStatus;
use crate::error::PlatformError;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectResponse {
    /// False when there was no stored connection
    pub disconnected: bool,
}

/// Send the user to Mailchimp to grant access
#[utoipa::path(
    get,
    path = "/api/auth/mailchimp/authorize",
    tag = "mailchimp-connection",
    responses(
        (status = 303, description = "Redirect to Mailchimp"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn authorize(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Redirect {
    Redirect::to(&state.oauth.begin(&user.user_id))
}

/// Mailchimp redirects here after consent
#[utoipa::path(
    get,
    path = "/api/auth/mailchimp/callback",
    tag = "mailchimp-connection",
    params(OAuthCallbackParams),
    responses((status = 303, description = "Back to the settings page with the outcome"))
)]
pub async fn callback(
    State(state): State<AppState>,
    auth: Result<Authenticated, PlatformError>,
    Query(params): Query<OAuthCallbackParams>,
) -> Redirect {
    let Ok(Authenticated(user)) = auth else {
        return settings_error("unauthorized");
    };

    if let Some(error) = &params.error {
        warn!(
            user_id = %user.user_id,
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "Mailchimp authorization declined"
        );
        metrics::counter!("mailchimp_oauth_total", "outcome" => "declined").increment(1);
        return settings_error(error_code_param(error));
    }

    let (Some(code), Some(oauth_state)) = (
        params.code.as_deref().filter(|c| !c.is_empty()),
        params.state.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return settings_error("missing_code");
    };

    match state.oauth.complete(&user.user_id, code, oauth_state).await {
        Ok(_) => Redirect::to("/settings?connected=true"),
        Err(e) => {
            error!(user_id = %user.user_id, error = %e, "Mailchimp connection failed");
            let code = match e {
                PlatformError::OAuth { .. } => "oauth_failed",
                PlatformError::Mailchimp(_) => "mailchimp_unavailable",
                _ => "connection_failed",
            };
            settings_error(code)
        }
    }
}

/// Connection status
#[utoipa::path(
    get,
    path = "/api/auth/mailchimp/status",
    tag = "mailchimp-connection",
    responses(
        (status = 200, description = "Connection status", body = ConnectionStatus),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn status(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<ConnectionStatus> {
    Ok(ok(state.connections.status(&user.user_id).await?))
}

/// Remove the stored Mailchimp connection
#[utoipa::path(
    post,
    path = "/api/auth/mailchimp/disconnect",
    tag = "mailchimp-connection",
    responses(
        (status = 200, description = "Connection removed", body = DisconnectResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn disconnect(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<DisconnectResponse> {
    let disconnected = state.connections.disconnect(&user.user_id).await?;
    Ok(ok(DisconnectResponse { disconnected }))
}

/// Keep error codes to a known, URL-safe alphabet
fn error_code_param(raw: &str) -> &'static str {
    match raw {
        "access_denied" => "access_denied",
        "invalid_request" => "invalid_request",
        "unauthorized_client" => "unauthorized_client",
        "server_error" | "temporarily_unavailable" => "mailchimp_unavailable",
        _ => "oauth_failed",
    }
}

fn settings_error(code: &str) -> Redirect {
    Redirect::to(&format!("/settings?error={}", code))
}

pub fn mailchimp_oauth_router() -> Router<AppState> {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/callback", get(callback))
        .route("/status", get(status))
        .route("/disconnect", post(disconnect))
}
