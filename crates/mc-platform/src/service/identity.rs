//! Identity provider integration (OIDC authorization code + PKCE)
//!
//! The IdP's access token is the session: it is kept in an HttpOnly cookie
//! and verified on every request against the provider's JWKS (RS256).

use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use mc_common::HealthCheck;
use mc_config::AppConfig;
use parking_lot::RwLock;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::domain::UserClaims;
use crate::error::{PlatformError, Result};

/// Minimum gap between JWKS fetches triggered by an unknown `kid`
pub const JWKS_REFETCH_FLOOR: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Issuer URL without trailing slash, e.g. "https://acme.kinde.com"
    pub issuer: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: String,
    /// Expected `aud` claim; audience is not checked when unset
    pub audience: Option<String>,
    pub scopes: String,
    pub jwks_cache_ttl: Duration,
    pub jwks_refetch_floor: Duration,
}

impl IdentityConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            issuer: config.identity.issuer.trim_end_matches('/').to_string(),
            client_id: config.identity.client_id.clone(),
            client_secret: config.identity.client_secret.clone(),
            redirect_uri: config.identity_redirect_uri(),
            post_logout_redirect_uri: config.post_logout_redirect_uri(),
            audience: config.identity.audience.clone().filter(|a| !a.is_empty()),
            scopes: config.identity.scopes.clone(),
            jwks_cache_ttl: Duration::from_secs(config.identity.jwks_cache_secs),
            jwks_refetch_floor: JWKS_REFETCH_FLOOR,
        }
    }

    pub fn authorization_endpoint(&self) -> String {
        format!("{}/oauth2/auth", self.issuer)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.issuer)
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer)
    }

    pub fn logout_endpoint(&self) -> String {
        format!("{}/logout", self.issuer)
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

pub struct IdentityService {
    config: IdentityConfig,
    http: reqwest::Client,
    jwks: RwLock<Option<CachedJwks>>,
}

// ============================================================================
// PKCE
// ============================================================================

pub fn generate_random_string(bytes: usize) -> String {
    let raw: Vec<u8> = (0..bytes).map(|_| rand::thread_rng().gen()).collect();
    URL_SAFE_NO_PAD.encode(&raw)
}

pub fn generate_code_verifier() -> String {
    generate_random_string(32)
}

/// S256 challenge for a verifier
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

impl IdentityService {
    pub fn new(config: IdentityConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http,
            jwks: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    pub fn login_url(&self, state: &str, code_challenge: &str) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.config.authorization_endpoint(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scopes),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        );
        if let Some(audience) = &self.config.audience {
            url.push_str(&format!("&audience={}", urlencoding::encode(audience)));
        }
        url
    }

    pub fn logout_url(&self) -> String {
        format!(
            "{}?redirect={}",
            self.config.logout_endpoint(),
            urlencoding::encode(&self.config.post_logout_redirect_uri)
        )
    }

    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenSet> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| PlatformError::oauth(format!("Token request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Identity provider rejected code exchange");
            return Err(PlatformError::oauth(format!("Token endpoint returned {}", status)));
        }

        response
            .json::<TokenSet>()
            .await
            .map_err(|e| PlatformError::oauth(format!("Failed to parse token response: {}", e)))
    }

    /// Verify signature, issuer, audience and expiry
    pub async fn validate_token(&self, token: &str) -> Result<UserClaims> {
        let header = decode_header(token)
            .map_err(|_| PlatformError::unauthorized("Malformed session token"))?;
        if header.alg != Algorithm::RS256 {
            return Err(PlatformError::unauthorized("Unsupported token algorithm"));
        }
        let kid = header
            .kid
            .ok_or_else(|| PlatformError::unauthorized("Session token has no key id"))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        let data = decode::<UserClaims>(token, &key, &validation).map_err(|e| {
            debug!(error = %e, "Session token rejected");
            PlatformError::unauthorized("Invalid or expired session")
        })?;
        Ok(data.claims)
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(key) = self.cached_key(kid)? {
            return Ok(key);
        }

        // unknown kid: at most one refetch per floor interval
        if self.recently_fetched() {
            debug!(kid = %kid, "Unknown signing key, JWKS refetch suppressed");
            return Err(PlatformError::unauthorized("Session token signed with an unknown key"));
        }

        let keys = self.fetch_jwks().await?;
        let key = match keys.find(kid) {
            Some(jwk) => Some(
                DecodingKey::from_jwk(jwk)
                    .map_err(|e| PlatformError::internal(format!("Unusable signing key: {}", e)))?,
            ),
            None => None,
        };
        *self.jwks.write() = Some(CachedJwks {
            keys,
            fetched_at: Instant::now(),
        });

        key.ok_or_else(|| PlatformError::unauthorized("Session token signed with an unknown key"))
    }

    fn recently_fetched(&self) -> bool {
        self.jwks
            .read()
            .as_ref()
            .map(|cached| {
                let age = cached.fetched_at.elapsed();
                age < self.config.jwks_refetch_floor && age <= self.config.jwks_cache_ttl
            })
            .unwrap_or(false)
    }

    fn cached_key(&self, kid: &str) -> Result<Option<DecodingKey>> {
        let cache = self.jwks.read();
        let Some(cached) = cache.as_ref() else {
            return Ok(None);
        };
        if cached.fetched_at.elapsed() > self.config.jwks_cache_ttl {
            return Ok(None);
        }
        match cached.keys.find(kid) {
            Some(jwk) => DecodingKey::from_jwk(jwk)
                .map(Some)
                .map_err(|e| PlatformError::internal(format!("Unusable signing key: {}", e))),
            None => Ok(None),
        }
    }

    async fn fetch_jwks(&self) -> Result<JwkSet> {
        let response = self
            .http
            .get(self.config.jwks_uri())
            .send()
            .await
            .map_err(|e| PlatformError::internal(format!("JWKS request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            return Err(PlatformError::internal(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| PlatformError::internal(format!("Invalid JWKS document: {}", e)))?;
        info!(keys = keys.keys.len(), "Fetched identity provider signing keys");
        Ok(keys)
    }

    /// Fresh JWKS fetch, bypassing the cache
    pub async fn check_jwks(&self) -> HealthCheck {
        let started = Instant::now();
        let result = self.fetch_jwks().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(keys) if keys.keys.is_empty() => {
                HealthCheck::unhealthy("identity_provider", latency_ms, "JWKS contains no keys")
            }
            Ok(keys) => {
                let count = keys.keys.len();
                *self.jwks.write() = Some(CachedJwks {
                    keys,
                    fetched_at: Instant::now(),
                });
                HealthCheck::healthy("identity_provider", latency_ms)
                    .with_message(format!("{} signing key(s)", count))
            }
            Err(e) => HealthCheck::unhealthy("identity_provider", latency_ms, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPrivateKey;
    use serde_json::json;
    use std::sync::OnceLock;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestKey {
        pem: String,
        n: String,
        e: String,
    }

    fn test_key() -> &'static TestKey {
        static KEY: OnceLock<TestKey> = OnceLock::new();
        KEY.get_or_init(|| {
            let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
            TestKey {
                pem: key.to_pkcs1_pem(LineEnding::LF).unwrap().to_string(),
                n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
                e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
            }
        })
    }

    fn jwks(kid: &str) -> serde_json::Value {
        let key = test_key();
        json!({"keys": [{"kty": "RSA", "kid": kid, "use": "sig", "alg": "RS256", "n": key.n, "e": key.e}]})
    }

    fn sign(kid: &str, claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(test_key().pem.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn claims(issuer: &str, exp_offset: i64) -> serde_json::Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": "kp_123",
            "iss": issuer,
            "aud": ["mc-dashboard"],
            "iat": now,
            "exp": now + exp_offset,
            "email": "freddie@example.com"
        })
    }

    fn config(issuer: &str) -> IdentityConfig {
        IdentityConfig {
            issuer: issuer.to_string(),
            client_id: "dashboard".to_string(),
            client_secret: Some("idp-secret".to_string()),
            redirect_uri: "http://localhost:3000/api/auth/callback".to_string(),
            post_logout_redirect_uri: "http://localhost:3000".to_string(),
            audience: Some("mc-dashboard".to_string()),
            scopes: "openid profile email".to_string(),
            jwks_cache_ttl: Duration::from_secs(600),
            jwks_refetch_floor: JWKS_REFETCH_FLOOR,
        }
    }

    async fn mount_jwks(server: &MockServer, kid: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks(kid)))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn test_code_challenge_matches_rfc7636() {
        assert_eq!(
            generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbRmspcHxgYM"
        );
        assert_ne!(generate_code_verifier(), generate_code_verifier());
    }

    #[test]
    fn test_login_and_logout_urls() {
        let service = IdentityService::new(config("https://acme.kinde.com")).unwrap();
        let url = service.login_url("st", "ch");
        assert!(url.starts_with("https://acme.kinde.com/oauth2/auth?response_type=code"));
        assert!(url.contains("code_challenge=ch&code_challenge_method=S256"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.ends_with("&audience=mc-dashboard"));

        assert_eq!(
            service.logout_url(),
            "https://acme.kinde.com/logout?redirect=http%3A%2F%2Flocalhost%3A3000"
        );
    }

    #[tokio::test]
    async fn test_valid_token_and_jwks_cache() {
        let server = MockServer::start().await;
        mount_jwks(&server, "key-1", 1).await;

        let service = IdentityService::new(config(&server.uri())).unwrap();
        let token = sign("key-1", claims(&server.uri(), 3600));

        let claims = service.validate_token(&token).await.unwrap();
        assert_eq!(claims.sub, "kp_123");
        assert_eq!(claims.email.as_deref(), Some("freddie@example.com"));

        // served from cache, the mock expects exactly one fetch
        service.validate_token(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_bad_claims() {
        let server = MockServer::start().await;
        mount_jwks(&server, "key-1", 1).await;
        let service = IdentityService::new(config(&server.uri())).unwrap();

        let expired = sign("key-1", claims(&server.uri(), -3600));
        assert!(matches!(
            service.validate_token(&expired).await,
            Err(PlatformError::Unauthorized { .. })
        ));

        let foreign = sign("key-1", claims("https://evil.example.com", 3600));
        assert!(service.validate_token(&foreign).await.is_err());

        let mut wrong_aud = claims(&server.uri(), 3600);
        wrong_aud["aud"] = json!("someone-else");
        assert!(service.validate_token(&sign("key-1", wrong_aud)).await.is_err());

        assert!(service.validate_token("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_kid_triggers_refetch() {
        let server = MockServer::start().await;
        mount_jwks(&server, "key-1", 2).await;
        let mut config = config(&server.uri());
        config.jwks_refetch_floor = Duration::ZERO;
        let service = IdentityService::new(config).unwrap();

        service
            .validate_token(&sign("key-1", claims(&server.uri(), 3600)))
            .await
            .unwrap();
        let err = service
            .validate_token(&sign("rotated", claims(&server.uri(), 3600)))
            .await
            .unwrap_err();
        assert_eq!(err.status().as_u16(), 401);
    }

    #[tokio::test]
    async fn test_unknown_kid_refetch_is_rate_limited() {
        let server = MockServer::start().await;
        mount_jwks(&server, "key-1", 1).await;
        let service = IdentityService::new(config(&server.uri())).unwrap();

        service
            .validate_token(&sign("key-1", claims(&server.uri(), 3600)))
            .await
            .unwrap();
        for _ in 0..20 {
            let err = service
                .validate_token(&sign("attacker", claims(&server.uri(), 3600)))
                .await
                .unwrap_err();
            assert_eq!(err.status().as_u16(), 401);
        }
        // known keys keep working from the cache
        service
            .validate_token(&sign("key-1", claims(&server.uri(), 3600)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(wiremock::matchers::body_string_contains("code_verifier=the-verifier"))
            .and(wiremock::matchers::body_string_contains("client_secret=idp-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "session-token",
                "id_token": "id",
                "expires_in": 86399,
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = IdentityService::new(config(&server.uri())).unwrap();
        let tokens = service.exchange_code("the-code", "the-verifier").await.unwrap();
        assert_eq!(tokens.access_token, "session-token");
        assert_eq!(tokens.expires_in, Some(86399));
    }

    #[tokio::test]
    async fn test_check_jwks() {
        let server = MockServer::start().await;
        mount_jwks(&server, "key-1", 1).await;
        let service = IdentityService::new(config(&server.uri())).unwrap();
        let check = service.check_jwks().await;
        assert!(check.healthy);
        assert_eq!(check.message.as_deref(), Some("1 signing key(s)"));

        let down = IdentityService::new(config("http://127.0.0.1:9")).unwrap();
        assert!(!down.check_jwks().await.healthy);
    }
}
