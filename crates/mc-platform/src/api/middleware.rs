//! API Middleware
//!
//! Shared application state and the authentication extractors.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use mc_client::MailchimpDal;
use mc_config::AppConfig;
use mc_secrets::TokenCipher;

use crate::api::auth::LoginStateStore;
use crate::domain::{AuthenticatedUser, UserClaims};
use crate::error::PlatformError;
use crate::repository::ConnectionRepository;
use crate::service::{
    client_config, ConnectionService, HealthService, IdentityConfig, IdentityService,
    MailchimpOAuthConfig, MailchimpOAuthService,
};

/// Session cookie settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub secure: bool,
    pub max_age_secs: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "mc_session".to_string(),
            secure: true,
            max_age_secs: 86400,
        }
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub connections: Arc<ConnectionService>,
    pub oauth: Arc<MailchimpOAuthService>,
    pub health: Arc<HealthService>,
    pub login_states: Arc<LoginStateStore>,
    pub session: SessionSettings,
}

impl AppState {
    /// Wire every service from configuration around a connection store
    pub fn build(
        config: &AppConfig,
        repo: Arc<dyn ConnectionRepository>,
        cipher: TokenCipher,
    ) -> Result<Self, PlatformError> {
        let connections = Arc::new(ConnectionService::new(repo, cipher, client_config(config))?);
        let identity = Arc::new(IdentityService::new(IdentityConfig::from_app_config(config))?);
        let oauth = Arc::new(MailchimpOAuthService::new(
            MailchimpOAuthConfig::from_app_config(config),
            connections.clone(),
        )?);
        let health = Arc::new(HealthService::new(connections.clone(), identity.clone()));

        Ok(Self {
            identity,
            connections,
            oauth,
            health,
            login_states: Arc::new(LoginStateStore::default()),
            session: SessionSettings {
                cookie_name: config.session.cookie_name.clone(),
                secure: config.session.secure,
                max_age_secs: config.session.max_age_secs,
            },
        })
    }
}

pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Session cookie first, then `Authorization: Bearer`
fn session_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(cookie_name) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string)
}

/// Extractor for authenticated requests.
/// Validates the IdP access token and exposes the signed-in user.
pub struct Authenticated(pub AuthenticatedUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Authenticated(user.clone()));
        }

        let app_state = AppState::from_ref(state);
        let token = session_token(parts, &app_state.session.cookie_name)
            .ok_or_else(|| PlatformError::unauthorized("Not signed in"))?;

        let claims: UserClaims = app_state.identity.validate_token(&token).await?;
        let user = AuthenticatedUser::from(claims);
        parts.extensions.insert(user.clone());
        Ok(Authenticated(user))
    }
}

/// Extractor for routes that proxy Mailchimp: a signed-in user with an
/// active connection, and a DAL bound to that connection.
pub struct Connected {
    pub user: AuthenticatedUser,
    pub dal: MailchimpDal,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Connected
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(user) = Authenticated::from_request_parts(parts, state).await?;
        let app_state = AppState::from_ref(state);
        let dal = app_state.connections.client_for_user(&user.user_id).await?;
        Ok(Connected { user, dal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc "), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }

    #[test]
    fn test_cookie_wins_over_header() {
        let request = axum::http::Request::builder()
            .header("Cookie", "other=1; mc_session=from-cookie")
            .header("Authorization", "Bearer from-header")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(session_token(&parts, "mc_session").as_deref(), Some("from-cookie"));
        assert_eq!(session_token(&parts, "missing").as_deref(), Some("from-header"));
    }
}
