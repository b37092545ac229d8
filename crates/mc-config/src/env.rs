//! Environment variable overrides
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `MC_HTTP_HOST` / `MC_HTTP_PORT` | `server.host` / `server.port` |
//! | `MC_EXTERNAL_BASE_URL` | `server.external_base_url` |
//! | `MC_CORS_ORIGINS` | `server.cors_allowed_origins` (comma separated) |
//! | `MC_DATABASE_URL` / `MC_DATABASE_MAX_CONNECTIONS` | `database.*` |
//! | `MAILCHIMP_CLIENT_ID` / `MAILCHIMP_CLIENT_SECRET` | `mailchimp.client_*` |
//! | `MAILCHIMP_REDIRECT_URI` | `mailchimp.redirect_uri` |
//! | `MAILCHIMP_API_BASE_URL` | `mailchimp.api_base_url` |
//! | `MAILCHIMP_TIMEOUT_SECS` | `mailchimp.request_timeout_secs` |
//! | `MC_IDP_ISSUER` / `MC_IDP_CLIENT_ID` / `MC_IDP_CLIENT_SECRET` | `identity.*` |
//! | `MC_IDP_REDIRECT_URI` / `MC_IDP_LOGOUT_REDIRECT_URI` / `MC_IDP_AUDIENCE` | `identity.*` |
//! | `MC_SESSION_COOKIE` / `MC_SESSION_SECURE` / `MC_SESSION_MAX_AGE_SECS` | `session.*` |
//! | `MC_ENCRYPTION_KEY` | `security.encryption_key` |
//! | `MC_SECRETS_PROVIDER` / `MC_SECRETS_DIR` | `security.secrets_*` |
//! | `MC_LOG_LEVEL` / `MC_LOG_FORMAT` | `logging.*` |

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{AppConfig, ConfigError, LogFormat};

/// Source of environment values, so overrides can be tested without touching the process env
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from `std::env`
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

fn parse<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(key: &str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

pub fn apply_env_overrides(config: &mut AppConfig, env: &dyn EnvSource) -> Result<(), ConfigError> {
    if let Some(v) = env.get("MC_HTTP_HOST") {
        config.server.host = v;
    }
    if let Some(v) = env.get("MC_HTTP_PORT") {
        config.server.port = parse("MC_HTTP_PORT", v)?;
    }
    if let Some(v) = env.get("MC_EXTERNAL_BASE_URL") {
        config.server.external_base_url = v;
    }
    if let Some(v) = env.get("MC_CORS_ORIGINS") {
        config.server.cors_allowed_origins = v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(v) = env.get("MC_DATABASE_URL") {
        config.database.url = v;
    }
    if let Some(v) = env.get("MC_DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = parse("MC_DATABASE_MAX_CONNECTIONS", v)?;
    }

    if let Some(v) = env.get("MAILCHIMP_CLIENT_ID") {
        config.mailchimp.client_id = v;
    }
    if let Some(v) = env.get("MAILCHIMP_CLIENT_SECRET") {
        config.mailchimp.client_secret = v;
    }
    if let Some(v) = env.get("MAILCHIMP_REDIRECT_URI") {
        config.mailchimp.redirect_uri = Some(v);
    }
    if let Some(v) = env.get("MAILCHIMP_API_BASE_URL") {
        config.mailchimp.api_base_url = Some(v);
    }
    if let Some(v) = env.get("MAILCHIMP_TIMEOUT_SECS") {
        config.mailchimp.request_timeout_secs = parse("MAILCHIMP_TIMEOUT_SECS", v)?;
    }

    if let Some(v) = env.get("MC_IDP_ISSUER") {
        config.identity.issuer = v;
    }
    if let Some(v) = env.get("MC_IDP_CLIENT_ID") {
        config.identity.client_id = v;
    }
    if let Some(v) = env.get("MC_IDP_CLIENT_SECRET") {
        config.identity.client_secret = Some(v);
    }
    if let Some(v) = env.get("MC_IDP_REDIRECT_URI") {
        config.identity.redirect_uri = Some(v);
    }
    if let Some(v) = env.get("MC_IDP_LOGOUT_REDIRECT_URI") {
        config.identity.post_logout_redirect_uri = Some(v);
    }
    if let Some(v) = env.get("MC_IDP_AUDIENCE") {
        config.identity.audience = Some(v);
    }

    if let Some(v) = env.get("MC_SESSION_COOKIE") {
        config.session.cookie_name = v;
    }
    if let Some(v) = env.get("MC_SESSION_SECURE") {
        config.session.secure = parse_bool("MC_SESSION_SECURE", v)?;
    }
    if let Some(v) = env.get("MC_SESSION_MAX_AGE_SECS") {
        config.session.max_age_secs = parse("MC_SESSION_MAX_AGE_SECS", v)?;
    }

    if let Some(v) = env.get("MC_ENCRYPTION_KEY") {
        config.security.encryption_key = v;
    }
    if let Some(v) = env.get("MC_SECRETS_PROVIDER") {
        config.security.secrets_provider = Some(v);
    }
    if let Some(v) = env.get("MC_SECRETS_DIR") {
        config.security.secrets_dir = Some(PathBuf::from(v));
    }

    if let Some(v) = env.get("MC_LOG_LEVEL") {
        config.logging.level = v;
    }
    if let Some(v) = env.get("MC_LOG_FORMAT") {
        config.logging.format = match v.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" | "pretty" => LogFormat::Text,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "MC_LOG_FORMAT".to_string(),
                    message: format!("expected 'text' or 'json', got '{}'", other),
                })
            }
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = AppConfig::default();
        let vars = env(&[
            ("MC_HTTP_PORT", "8088"),
            ("MAILCHIMP_CLIENT_ID", "client-1"),
            ("MC_SESSION_SECURE", "false"),
            ("MC_CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("MC_LOG_FORMAT", "JSON"),
        ]);

        apply_env_overrides(&mut config, &vars).unwrap();

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.mailchimp.client_id, "client-1");
        assert!(!config.session.secure);
        assert_eq!(config.server.cors_allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_bad_port_is_reported_with_key() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(&mut config, &env(&[("MC_HTTP_PORT", "eighty")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "MC_HTTP_PORT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_bool() {
        let mut config = AppConfig::default();
        assert!(apply_env_overrides(&mut config, &env(&[("MC_SESSION_SECURE", "maybe")])).is_err());
    }
}
