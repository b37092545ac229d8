//! Mailchimp Dashboard Configuration
//!
//! Layered configuration:
//! 1. Built-in defaults
//! 2. Optional TOML file (`MC_CONFIG_FILE`, or `config/mc-dashboard.toml` when present)
//! 3. Environment variables (a `.env` file is read first when present)
//!
//! `validate()` collects every problem so a misconfigured deploy fails once
//! with the full list instead of one setting at a time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

mod env;

pub use env::{apply_env_overrides, EnvSource, ProcessEnv};

pub const DEFAULT_CONFIG_PATH: &str = "config/mc-dashboard.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public URL used to build OAuth callback URLs (e.g. "https://dash.example.com")
    pub external_base_url: String,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            external_base_url: "http://localhost:3000".to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Connection store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/mc-dashboard.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// Mailchimp OAuth application and API client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailchimpConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Defaults to `{external_base_url}/api/auth/mailchimp/callback`
    pub redirect_uri: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub metadata_url: String,
    /// Overrides `https://{dc}.api.mailchimp.com/3.0`
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for MailchimpConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: None,
            authorize_url: "https://login.mailchimp.com/oauth2/authorize".to_string(),
            token_url: "https://login.mailchimp.com/oauth2/token".to_string(),
            metadata_url: "https://login.mailchimp.com/oauth2/metadata".to_string(),
            api_base_url: None,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Identity provider (OIDC) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Issuer URL, e.g. "https://acme.kinde.com"
    pub issuer: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    /// Defaults to `{external_base_url}/api/auth/callback`
    pub redirect_uri: Option<String>,
    /// Defaults to `{external_base_url}`
    pub post_logout_redirect_uri: Option<String>,
    pub audience: Option<String>,
    pub scopes: String,
    pub jwks_cache_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            client_id: String::new(),
            client_secret: None,
            redirect_uri: None,
            post_logout_redirect_uri: None,
            audience: None,
            scopes: "openid profile email".to_string(),
            jwks_cache_secs: 600,
        }
    }
}

/// Session cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secure: bool,
    pub max_age_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "mc_session".to_string(),
            secure: true,
            max_age_secs: 86400,
        }
    }
}

/// Secret material settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Key for encrypting stored access tokens (32 bytes, 64 hex chars, or base64)
    pub encryption_key: String,
    /// Secrets provider: "env" or "encrypted"
    pub secrets_provider: Option<String>,
    pub secrets_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mailchimp: MailchimpConfig,
    pub identity: IdentityConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load defaults + file + process environment, then validate
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::InvalidValue {
                key: ".env".to_string(),
                message: e.to_string(),
            }),
        }

        let explicit = std::env::var("MC_CONFIG_FILE").ok().map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        apply_env_overrides(&mut config, &ProcessEnv)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.server.port == 0 {
            problems.push("server.port must be non-zero".to_string());
        }
        if !is_http_url(&self.server.external_base_url) {
            problems.push("server.external_base_url must be an http(s) URL".to_string());
        }
        if self.database.url.trim().is_empty() {
            problems.push("database.url is required".to_string());
        }
        if self.database.max_connections == 0 {
            problems.push("database.max_connections must be at least 1".to_string());
        }
        if self.mailchimp.client_id.trim().is_empty() {
            problems.push("mailchimp.client_id is required (MAILCHIMP_CLIENT_ID)".to_string());
        }
        if self.mailchimp.client_secret.trim().is_empty() {
            problems.push("mailchimp.client_secret is required (MAILCHIMP_CLIENT_SECRET)".to_string());
        }
        for (key, url) in [
            ("mailchimp.authorize_url", &self.mailchimp.authorize_url),
            ("mailchimp.token_url", &self.mailchimp.token_url),
            ("mailchimp.metadata_url", &self.mailchimp.metadata_url),
        ] {
            if !is_http_url(url) {
                problems.push(format!("{} must be an http(s) URL", key));
            }
        }
        if let Some(base) = &self.mailchimp.api_base_url {
            if !is_http_url(base) {
                problems.push("mailchimp.api_base_url must be an http(s) URL".to_string());
            }
        }
        if self.mailchimp.request_timeout_secs == 0 {
            problems.push("mailchimp.request_timeout_secs must be at least 1".to_string());
        }
        if !is_http_url(&self.identity.issuer) {
            problems.push("identity.issuer must be an http(s) URL (MC_IDP_ISSUER)".to_string());
        }
        if self.identity.client_id.trim().is_empty() {
            problems.push("identity.client_id is required (MC_IDP_CLIENT_ID)".to_string());
        }
        if self.session.cookie_name.trim().is_empty() {
            problems.push("session.cookie_name is required".to_string());
        }
        if self.session.max_age_secs <= 0 {
            problems.push("session.max_age_secs must be positive".to_string());
        }
        if self.security.encryption_key.trim().is_empty() {
            problems.push("security.encryption_key is required (MC_ENCRYPTION_KEY)".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn base_url(&self) -> &str {
        self.server.external_base_url.trim_end_matches('/')
    }

    pub fn mailchimp_redirect_uri(&self) -> String {
        self.mailchimp
            .redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}/api/auth/mailchimp/callback", self.base_url()))
    }

    pub fn identity_redirect_uri(&self) -> String {
        self.identity
            .redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}/api/auth/callback", self.base_url()))
    }

    pub fn post_logout_redirect_uri(&self) -> String {
        self.identity
            .post_logout_redirect_uri
            .clone()
            .unwrap_or_else(|| self.base_url().to_string())
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    (value.starts_with("http://") || value.starts_with("https://")) && value.len() > "https://".len()
}
