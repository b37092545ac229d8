//! Mailchimp OAuth2 (authorization-code grant)
//!
//! 1. `begin` stores a single-use CSRF state and returns the authorize URL
//! 2. Mailchimp redirects back with `code` + `state`
//! 3. `complete` consumes the state, exchanges the code, reads the account
//!    metadata (which carries the data-center prefix) and stores the connection
//!
//! Mailchimp access tokens never expire, so there is no refresh step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use mc_client::{retry_with_backoff, RetryPolicy};
use mc_config::AppConfig;
use parking_lot::RwLock;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{MailchimpConnection, NewConnection};
use crate::error::{PlatformError, Result};
use crate::service::connection::ConnectionService;

const STATE_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct MailchimpOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub metadata_url: String,
    pub state_ttl: Duration,
    pub request_timeout: Duration,
}

impl MailchimpOAuthConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            client_id: config.mailchimp.client_id.clone(),
            client_secret: config.mailchimp.client_secret.clone(),
            redirect_uri: config.mailchimp_redirect_uri(),
            authorize_url: config.mailchimp.authorize_url.clone(),
            token_url: config.mailchimp.token_url.clone(),
            metadata_url: config.mailchimp.metadata_url.clone(),
            state_ttl: Duration::from_secs(600),
            request_timeout: Duration::from_secs(config.mailchimp.request_timeout_secs),
        }
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Mailchimp sends 0 (never expires)
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// `GET /oauth2/metadata` response
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthMetadata {
    /// Data-center prefix, e.g. `us6`
    pub dc: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub accountname: Option<String>,
    /// Numeric in practice; accepted as either
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub login: Option<OAuthLogin>,
    #[serde(default)]
    pub login_url: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

impl OAuthMetadata {
    pub fn account_id(&self) -> Option<String> {
        match &self.user_id {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn login_email(&self) -> Option<String> {
        self.login
            .as_ref()
            .and_then(|l| l.login_email.clone().or_else(|| l.email.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthLogin {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub login_id: Option<Value>,
    #[serde(default)]
    pub login_name: Option<String>,
    #[serde(default)]
    pub login_email: Option<String>,
}

#[derive(Debug, Clone)]
struct PendingState {
    user_id: String,
    created_at: DateTime<Utc>,
}

pub struct MailchimpOAuthService {
    config: MailchimpOAuthConfig,
    http: reqwest::Client,
    retry: RetryPolicy,
    connections: Arc<ConnectionService>,
    pending: RwLock<HashMap<String, PendingState>>,
}

impl MailchimpOAuthService {
    pub fn new(config: MailchimpOAuthConfig, connections: Arc<ConnectionService>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PlatformError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http,
            retry: RetryPolicy::default(),
            connections,
            pending: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn generate_state() -> String {
        let bytes: [u8; STATE_BYTES] = rand::thread_rng().gen();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// Remember a fresh state for `user_id` and return where to send the browser
    pub fn begin(&self, user_id: &str) -> String {
        let state = Self::generate_state();
        let mut pending = self.pending.write();
        self.purge_expired(&mut pending);
        pending.insert(
            state.clone(),
            PendingState {
                user_id: user_id.to_string(),
                created_at: Utc::now(),
            },
        );
        drop(pending);

        debug!(user_id = %user_id, "Started Mailchimp OAuth flow");
        self.authorization_url(&state)
    }

    /// Single use: the state is removed whether or not it matches
    pub fn consume_state(&self, state: &str, user_id: &str) -> Result<()> {
        let entry = {
            let mut pending = self.pending.write();
            let entry = pending.remove(state);
            self.purge_expired(&mut pending);
            entry
        };

        let entry = entry.ok_or_else(|| PlatformError::oauth("Unknown or already used OAuth state"))?;
        if self.is_expired(&entry) {
            return Err(PlatformError::oauth("OAuth state expired, please try again"));
        }
        if entry.user_id != user_id {
            warn!(user_id = %user_id, "OAuth state belongs to a different user");
            return Err(PlatformError::oauth("OAuth state does not match the signed-in user"));
        }
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    fn is_expired(&self, entry: &PendingState) -> bool {
        (Utc::now() - entry.created_at)
            .to_std()
            .map(|age| age > self.config.state_ttl)
            .unwrap_or(false)
    }

    fn purge_expired(&self, pending: &mut HashMap<String, PendingState>) {
        pending.retain(|_, entry| !self.is_expired(entry));
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        if code.trim().is_empty() {
            return Err(PlatformError::oauth("Missing authorization code"));
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
        ];
        let params = &params;

        retry_with_backoff(&self.retry, "mailchimp_token_exchange", is_retryable, || async move {
            let response = self
                .http
                .post(&self.config.token_url)
                .form(params)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(upstream_error("Token exchange", status, &body));
            }

            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| PlatformError::oauth(format!("Invalid token response: {}", e)))?;
            if token.access_token.is_empty() {
                return Err(PlatformError::oauth("Token response did not include an access token"));
            }
            Ok(token)
        })
        .await
    }

    pub async fn fetch_metadata(&self, access_token: &str) -> Result<OAuthMetadata> {
        retry_with_backoff(&self.retry, "mailchimp_metadata", is_retryable, || async move {
            let response = self
                .http
                .get(&self.config.metadata_url)
                .header(reqwest::header::AUTHORIZATION, format!("OAuth {}", access_token))
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(upstream_error("Metadata lookup", status, &body));
            }

            let metadata: OAuthMetadata = response
                .json()
                .await
                .map_err(|e| PlatformError::oauth(format!("Invalid metadata response: {}", e)))?;
            if !mc_client::is_valid_server_prefix(&metadata.dc.to_lowercase()) {
                return Err(PlatformError::oauth(format!(
                    "Metadata returned an invalid data center '{}'",
                    metadata.dc
                )));
            }
            Ok(metadata)
        })
        .await
    }

    /// Finish the flow started by `begin`
    pub async fn complete(&self, user_id: &str, code: &str, state: &str) -> Result<MailchimpConnection> {
        let outcome = self.complete_inner(user_id, code, state).await;
        let label = if outcome.is_ok() { "success" } else { "failure" };
        metrics::counter!("mailchimp_oauth_total", "outcome" => label).increment(1);
        outcome
    }

    async fn complete_inner(&self, user_id: &str, code: &str, state: &str) -> Result<MailchimpConnection> {
        self.consume_state(state, user_id)?;

        let token = self.exchange_code(code).await?;
        let metadata = self.fetch_metadata(&token.access_token).await?;

        let account_id = metadata
            .account_id()
            .ok_or_else(|| PlatformError::oauth("Metadata did not include an account id"))?;
        let account_name = metadata
            .accountname
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| account_id.clone());

        let connection = self
            .connections
            .connect(NewConnection {
                user_id: user_id.to_string(),
                access_token: token.access_token,
                server_prefix: metadata.dc.to_lowercase(),
                account_id,
                account_name,
                login_email: metadata.login_email(),
                api_endpoint: metadata.api_endpoint.clone(),
            })
            .await?;

        info!(user_id = %user_id, dc = %connection.server_prefix, "Mailchimp OAuth completed");
        Ok(connection)
    }
}

fn is_retryable(error: &PlatformError) -> bool {
    matches!(error, PlatformError::Mailchimp(e) if e.is_retryable())
}

fn transport_error(error: reqwest::Error) -> PlatformError {
    let timed_out = error.is_timeout();
    let message = format!("OAuth request failed: {}", error.without_url());
    if timed_out {
        mc_client::MailchimpError::timeout(message).into()
    } else {
        mc_client::MailchimpError::network(message).into()
    }
}

/// 5xx and 429 stay retryable upstream errors; anything else is a flow failure
fn upstream_error(operation: &str, status: reqwest::StatusCode, body: &str) -> PlatformError {
    let parsed: Option<OAuthErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .and_then(|b| b.error_description.or(b.error))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("{} returned HTTP {}", operation, status.as_u16()));

    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        mc_client::MailchimpError::fetch(status.as_u16(), message).into()
    } else {
        PlatformError::oauth(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SqliteConnectionRepository;
    use mc_client::MailchimpClientConfig;
    use mc_secrets::TokenCipher;
    use sqlx::sqlite::SqlitePoolOptions;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(server: &MockServer) -> MailchimpOAuthService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = SqliteConnectionRepository::new(pool);
        repo.migrate().await.unwrap();
        let connections = ConnectionService::new(
            Arc::new(repo),
            TokenCipher::new(&"k".repeat(32)).unwrap(),
            MailchimpClientConfig::default(),
        )
        .unwrap();

        let config = MailchimpOAuthConfig {
            client_id: "123456".to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "http://localhost:3000/api/auth/mailchimp/callback".to_string(),
            authorize_url: format!("{}/oauth2/authorize", server.uri()),
            token_url: format!("{}/oauth2/token", server.uri()),
            metadata_url: format!("{}/oauth2/metadata", server.uri()),
            state_ttl: Duration::from_secs(600),
            request_timeout: Duration::from_secs(5),
        };
        MailchimpOAuthService::new(config, Arc::new(connections))
            .unwrap()
            .with_retry_policy(RetryPolicy {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                ..Default::default()
            })
    }

    fn state_from(url: &str) -> String {
        url.split("state=").nth(1).unwrap().to_string()
    }

    #[test]
    fn test_generate_state_is_random_and_url_safe() {
        let a = MailchimpOAuthService::generate_state();
        let b = MailchimpOAuthService::generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn test_authorization_url() {
        let server = MockServer::start().await;
        let service = service(&server).await;
        let url = service.authorization_url("abc");

        assert!(url.starts_with(&format!("{}/oauth2/authorize?response_type=code", server.uri())));
        assert!(url.contains("client_id=123456"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapi%2Fauth%2Fmailchimp%2Fcallback"));
        assert!(url.ends_with("state=abc"));
    }

    #[tokio::test]
    async fn test_state_is_single_use_and_bound_to_user() {
        let server = MockServer::start().await;
        let service = service(&server).await;

        let state = state_from(&service.begin("user-1"));
        assert!(service.consume_state(&state, "user-2").is_err());
        // the failed attempt still burned the state
        assert!(service.consume_state(&state, "user-1").is_err());

        let state = state_from(&service.begin("user-1"));
        assert!(service.consume_state(&state, "user-1").is_ok());
        assert!(service.consume_state(&state, "user-1").is_err());
        assert_eq!(service.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_state_is_rejected() {
        let server = MockServer::start().await;
        let mut service = service(&server).await;
        service.config.state_ttl = Duration::ZERO;

        let state = state_from(&service.begin("user-1"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let err = service.consume_state(&state, "user-1").unwrap_err();
        assert!(matches!(err, PlatformError::OAuth { .. }));
    }

    #[tokio::test]
    async fn test_complete_stores_connection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_secret=shh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mc-token",
                "expires_in": 0,
                "scope": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/oauth2/metadata"))
            .and(header("Authorization", "OAuth mc-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dc": "us6",
                "role": "owner",
                "accountname": "Freddie's Jokes",
                "user_id": 8675309,
                "login": {
                    "email": "freddie@example.com",
                    "login_id": 42,
                    "login_name": "freddie",
                    "login_email": "freddie@example.com"
                },
                "login_url": "https://login.mailchimp.com",
                "api_endpoint": "https://us6.api.mailchimp.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server).await;
        let state = state_from(&service.begin("user-1"));
        let connection = service.complete("user-1", "the-code", &state).await.unwrap();

        assert_eq!(connection.server_prefix, "us6");
        assert_eq!(connection.account_id, "8675309");
        assert_eq!(connection.account_name, "Freddie's Jokes");
        assert_eq!(connection.login_email.as_deref(), Some("freddie@example.com"));
        assert!(connection.is_active);
    }

    #[tokio::test]
    async fn test_invalid_grant_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid authorization code"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server).await;
        let err = service.exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, PlatformError::OAuth { .. }));
        assert!(err.to_string().contains("Invalid authorization code"));
    }

    #[tokio::test]
    async fn test_token_timeout_is_a_retryable_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(3)
            .mount(&server)
            .await;

        let mut service = service(&server).await;
        service.config.request_timeout = Duration::from_millis(50);
        service.http = reqwest::Client::builder()
            .timeout(service.config.request_timeout)
            .build()
            .unwrap();

        let err = service.exchange_code("the-code").await.unwrap_err();
        assert_eq!(err.status().as_u16(), 504);
        assert!(err.to_string().contains("OAuth request failed"));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint_is_a_network_error() {
        let server = MockServer::start().await;
        let mut service = service(&server).await;
        service.config.token_url = "http://127.0.0.1:9/oauth2/token".to_string();

        let err = service.exchange_code("the-code").await.unwrap_err();
        assert_eq!(err.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/oauth2/metadata"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let service = service(&server).await;
        let err = service.fetch_metadata("mc-token").await.unwrap_err();
        assert_eq!(err.status().as_u16(), 502);
    }
}
