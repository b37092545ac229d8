//! Auth API Endpoints
//!
//! Sign-in through the identity provider:
//! - GET /api/auth/login - Redirect to the IdP (state + PKCE)
//! - GET /api/auth/callback - Exchange the code, set the session cookie
//! - GET /api/auth/logout - Clear the session and sign out at the IdP
//! - GET /api/auth/me - Current user

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{error, info, warn};
use utoipa::IntoParams;

use crate::api::common::{ok, ApiResult};
use crate::api::middleware::{AppState, Authenticated, SessionSettings};
use crate::domain::AuthenticatedUser;
use crate::service::{generate_code_challenge, generate_code_verifier, generate_random_string};

const LOGIN_STATE_TTL: Duration = Duration::from_secs(600);

// ==================== Pending logins ====================

#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub code_verifier: String,
    pub return_to: Option<String>,
    created_at: DateTime<Utc>,
}

/// In-memory store of logins waiting for the IdP callback
pub struct LoginStateStore {
    ttl: Duration,
    states: Mutex<HashMap<String, PendingLogin>>,
}

impl Default for LoginStateStore {
    fn default() -> Self {
        Self::new(LOGIN_STATE_TTL)
    }
}

impl LoginStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, state: &str, code_verifier: String, return_to: Option<String>) {
        let mut states = self.states.lock();
        let ttl = self.ttl;
        states.retain(|_, login| !expired(login, ttl));
        states.insert(
            state.to_string(),
            PendingLogin {
                code_verifier,
                return_to,
                created_at: Utc::now(),
            },
        );
    }

    /// Remove and return a still-valid login
    pub fn take(&self, state: &str) -> Option<PendingLogin> {
        let login = self.states.lock().remove(state)?;
        (!expired(&login, self.ttl)).then_some(login)
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn expired(login: &PendingLogin, ttl: Duration) -> bool {
    (Utc::now() - login.created_at)
        .to_std()
        .map(|age| age > ttl)
        .unwrap_or(false)
}

// ==================== Request Types ====================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LoginParams {
    /// Relative path to land on after sign-in
    pub return_to: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// ==================== Endpoints ====================

/// Start sign-in at the identity provider
#[utoipa::path(
    get,
    path = "/api/auth/login",
    tag = "auth",
    params(LoginParams),
    responses((status = 303, description = "Redirect to the identity provider"))
)]
pub async fn login(State(state): State<AppState>, Query(params): Query<LoginParams>) -> Redirect {
    let login_state = generate_random_string(32);
    let verifier = generate_code_verifier();
    let challenge = generate_code_challenge(&verifier);

    let return_to = params.return_to.filter(|r| is_safe_return_path(r));
    state.login_states.insert(&login_state, verifier, return_to);

    Redirect::to(&state.identity.login_url(&login_state, &challenge))
}

/// Identity provider callback
#[utoipa::path(
    get,
    path = "/api/auth/callback",
    tag = "auth",
    params(CallbackParams),
    responses((status = 303, description = "Session cookie set, redirect into the app"))
)]
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = &params.error {
        warn!(
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "Identity provider returned an error"
        );
        return error_redirect(params.error_description.as_deref().unwrap_or(error));
    }

    let code = match params.code.as_deref() {
        Some(c) if !c.is_empty() => c,
        _ => return error_redirect("No authorization code received"),
    };
    let login_state = match params.state.as_deref() {
        Some(s) if !s.is_empty() => s,
        _ => return error_redirect("No state parameter received"),
    };

    let Some(pending) = state.login_states.take(login_state) else {
        warn!("Invalid or expired login state");
        return error_redirect("Invalid or expired login session. Please try again.");
    };

    let tokens = match state.identity.exchange_code(code, &pending.code_verifier).await {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Token exchange failed");
            return error_redirect("Failed to exchange authorization code");
        }
    };

    let claims = match state.identity.validate_token(&tokens.access_token).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Access token validation failed");
            return error_redirect("Failed to validate identity token");
        }
    };

    let max_age = tokens
        .expires_in
        .filter(|secs| *secs > 0)
        .unwrap_or(state.session.max_age_secs);
    let jar = jar.add(session_cookie(&state.session, tokens.access_token, max_age));

    info!(user_id = %claims.sub, "User signed in");
    (jar, Redirect::to(&determine_redirect_url(pending.return_to.as_deref()))).into_response()
}

/// Clear the session and sign out at the identity provider
#[utoipa::path(
    get,
    path = "/api/auth/logout",
    tag = "auth",
    responses((status = 303, description = "Redirect to the identity provider logout"))
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let jar = jar.remove(Cookie::build(state.session.cookie_name.clone()).path("/"));
    (jar, Redirect::to(&state.identity.logout_url())).into_response()
}

/// Current user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Signed-in user", body = AuthenticatedUser),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(Authenticated(user): Authenticated) -> ApiResult<AuthenticatedUser> {
    Ok(ok(user))
}

// ==================== Helper Functions ====================

fn session_cookie(settings: &SessionSettings, token: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((settings.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Only same-site relative paths; `//host` and schemes are open redirects
fn is_safe_return_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') && !path.contains("://")
}

fn determine_redirect_url(return_to: Option<&str>) -> String {
    match return_to {
        Some(path) if is_safe_return_path(path) => path.to_string(),
        _ => "/dashboard".to_string(),
    }
}

fn error_redirect(message: &str) -> Response {
    Redirect::to(&format!("/?error={}", urlencoding::encode(message))).into_response()
}

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
        .route("/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_targets() {
        assert_eq!(determine_redirect_url(Some("/reports/c1")), "/reports/c1");
        assert_eq!(determine_redirect_url(Some("https://evil.example.com")), "/dashboard");
        assert_eq!(determine_redirect_url(Some("//evil.example.com")), "/dashboard");
        assert_eq!(determine_redirect_url(None), "/dashboard");
    }

    #[test]
    fn test_login_state_is_single_use() {
        let store = LoginStateStore::default();
        store.insert("s1", "verifier".to_string(), Some("/lists".to_string()));

        let login = store.take("s1").unwrap();
        assert_eq!(login.code_verifier, "verifier");
        assert_eq!(login.return_to.as_deref(), Some("/lists"));
        assert!(store.take("s1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_login_state() {
        let store = LoginStateStore::new(Duration::ZERO);
        store.insert("s1", "verifier".to_string(), None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.take("s1").is_none());
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie(&SessionSettings::default(), "tok".to_string(), 3600);
        assert_eq!(cookie.name(), "mc_session");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
    }
}
