//! Mailchimp Dashboard Server
//!
//! Serves the dashboard backend:
//! - Session login against the OIDC identity provider (`/api/auth/*`)
//! - Mailchimp account connection (`/api/auth/mailchimp/*`)
//! - Read-only Mailchimp analytics (`/api/mailchimp/*`)
//! - Health probes, Prometheus metrics and Swagger UI
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MC_CONFIG_FILE` | `config/mc-dashboard.toml` | Optional TOML config |
//! | `MC_HTTP_PORT` | `3000` | HTTP port |
//! | `MC_DATABASE_URL` | `sqlite://data/mc-dashboard.db?mode=rwc` | Connection store |
//! | `MC_ENCRYPTION_KEY` | - | Key for stored Mailchimp tokens |
//! | `MAILCHIMP_CLIENT_ID` / `MAILCHIMP_CLIENT_SECRET` | - | Mailchimp OAuth app |
//! | `MC_IDP_ISSUER` / `MC_IDP_CLIENT_ID` | - | Identity provider |
//! | `MC_LOG_FORMAT` | `text` | `text` or `json` |
//! | `RUST_LOG` | `info` | Log filter |

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mc_config::{AppConfig, LogFormat};
use mc_platform::repository::SqliteConnectionRepository;
use mc_platform::{build_router, AppState};
use mc_secrets::{create_provider, get_optional, SecretsConfig, TokenCipher};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting Mailchimp Dashboard Server");

    apply_secret_overrides(&mut config).await?;

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let cipher = TokenCipher::new(&config.security.encryption_key)
        .context("security.encryption_key is not a valid 256-bit key")?;

    ensure_sqlite_dir(&config.database.url)?;
    info!(max_connections = config.database.max_connections, "Opening connection store");
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to open database")?;
    let repo = SqliteConnectionRepository::new(pool);
    repo.migrate().await.context("Failed to migrate database")?;

    let state = AppState::build(&config, Arc::new(repo), cipher)
        .context("Failed to initialise services")?;
    info!(issuer = %state.identity.config().issuer, "Services initialised");

    let app = build_router(state)
        .merge(metrics_router(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server.cors_allowed_origins));

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API server listening on http://{}", addr);
    info!("Swagger UI at {}/swagger-ui", config.server.external_base_url.trim_end_matches('/'));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Mailchimp Dashboard Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Client secrets from the configured secrets provider take precedence
async fn apply_secret_overrides(config: &mut AppConfig) -> Result<()> {
    let Some(provider_name) = config.security.secrets_provider.clone() else {
        return Ok(());
    };

    let defaults = SecretsConfig::default();
    let provider = create_provider(&SecretsConfig {
        provider: provider_name,
        encryption_key: Some(config.security.encryption_key.clone()),
        data_dir: config.security.secrets_dir.clone().unwrap_or(defaults.data_dir),
        env_prefix: None,
    })
    .await
    .context("Failed to create secrets provider")?;

    if let Some(secret) = get_optional(provider.as_ref(), "mailchimp/client-secret").await? {
        config.mailchimp.client_secret = secret;
    }
    if let Some(secret) = get_optional(provider.as_ref(), "idp/client-secret").await? {
        config.identity.client_secret = Some(secret);
    }
    info!(provider = provider.name(), "Client secrets resolved");
    Ok(())
}

/// SQLite will not create missing parent directories
fn ensure_sqlite_dir(url: &str) -> Result<()> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);
    if file.is_empty() || file == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_sqlite_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/nested/db.sqlite?mode=rwc", dir.path().display());
        ensure_sqlite_dir(&url).unwrap();
        assert!(dir.path().join("nested").is_dir());

        ensure_sqlite_dir("sqlite::memory:").unwrap();
    }
}
