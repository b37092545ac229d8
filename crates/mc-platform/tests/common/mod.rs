//! Shared fixtures: a fully wired router backed by in-memory SQLite, a mocked
//! identity provider serving a test JWKS, and a mocked Mailchimp API.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use mc_config::AppConfig;
use mc_platform::domain::NewConnection;
use mc_platform::repository::SqliteConnectionRepository;
use mc_platform::{build_router, AppState};
use mc_secrets::TokenCipher;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER_ID: &str = "kp_123";
pub const MAILCHIMP_TOKEN: &str = "mc-access-token";
const KID: &str = "test-key";
const AUDIENCE: &str = "mc-dashboard";

struct SigningKey {
    pem: String,
    n: String,
    e: String,
}

fn signing_key() -> &'static SigningKey {
    static KEY: OnceLock<SigningKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        SigningKey {
            pem: key.to_pkcs1_pem(LineEnding::LF).unwrap().to_string(),
            n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        }
    })
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub idp: MockServer,
    pub mailchimp: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Like `spawn`, with a hook to adjust the config before services are built
    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let idp = MockServer::start().await;
        let mailchimp = MockServer::start().await;

        let key = signing_key();
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kty": "RSA", "kid": KID, "use": "sig", "alg": "RS256", "n": key.n, "e": key.e}]
            })))
            .mount(&idp)
            .await;

        let mut config = AppConfig::default();
        config.identity.issuer = idp.uri();
        config.identity.client_id = "dashboard".to_string();
        config.identity.audience = Some(AUDIENCE.to_string());
        config.mailchimp.client_id = "mc-client".to_string();
        config.mailchimp.client_secret = "mc-secret".to_string();
        config.mailchimp.api_base_url = Some(format!("{}/3.0", mailchimp.uri()));
        configure(&mut config);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = SqliteConnectionRepository::new(pool);
        repo.migrate().await.unwrap();

        let cipher = TokenCipher::new(&TokenCipher::generate_key()).unwrap();
        let state = AppState::build(&config, Arc::new(repo), cipher).unwrap();
        let router = build_router(state.clone());

        Self {
            router,
            state,
            idp,
            mailchimp,
        }
    }

    /// IdP access token for `USER_ID`
    pub fn token(&self) -> String {
        self.token_with_kid(KID)
    }

    /// Token signed with the test key but advertising another key id
    pub fn token_with_kid(&self, kid: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = json!({
            "sub": USER_ID,
            "iss": self.state.identity.config().issuer,
            "aud": [AUDIENCE],
            "iat": now,
            "exp": now + 3600,
            "email": "freddie@example.com",
            "name": "Freddie"
        });
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(signing_key().pem.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    /// Store an active Mailchimp connection for `USER_ID`
    pub async fn connect_mailchimp(&self) {
        self.state
            .connections
            .connect(NewConnection {
                user_id: USER_ID.to_string(),
                access_token: MAILCHIMP_TOKEN.to_string(),
                server_prefix: "us6".to_string(),
                account_id: "acc-1".to_string(),
                account_name: "Freddie's Jokes".to_string(),
                login_email: Some("freddie@example.com".to_string()),
                api_endpoint: None,
            })
            .await
            .unwrap();
    }

    /// Requests the mocked identity provider received for its JWKS
    pub async fn jwks_fetches(&self) -> usize {
        self.idp
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/.well-known/jwks.json")
            .count()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("GET", uri, token).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("POST", uri, token).await
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}
