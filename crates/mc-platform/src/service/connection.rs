//! Connection lifecycle: store, inspect, revoke, and turn a stored
//! connection into a ready-to-use Mailchimp DAL.

use std::sync::Arc;
use std::time::Duration;

use mc_client::schemas::PingResponse;
use mc_client::{MailchimpClientConfig, MailchimpDal, MailchimpFetchClient, MailchimpResponse};
use mc_config::AppConfig;
use mc_secrets::TokenCipher;
use tracing::{info, warn};

use crate::domain::{ConnectionStatus, MailchimpConnection, NewConnection};
use crate::error::{PlatformError, Result};
use crate::repository::ConnectionRepository;

/// Fetch client settings from the `[mailchimp]` section
pub fn client_config(config: &AppConfig) -> MailchimpClientConfig {
    MailchimpClientConfig {
        api_base_url: config.mailchimp.api_base_url.clone(),
        timeout: Duration::from_secs(config.mailchimp.request_timeout_secs),
        connect_timeout: Duration::from_secs(config.mailchimp.connect_timeout_secs),
        ..Default::default()
    }
}

pub struct ConnectionService {
    repo: Arc<dyn ConnectionRepository>,
    cipher: TokenCipher,
    client_config: MailchimpClientConfig,
    http: reqwest::Client,
}

impl ConnectionService {
    pub fn new(
        repo: Arc<dyn ConnectionRepository>,
        cipher: TokenCipher,
        client_config: MailchimpClientConfig,
    ) -> Result<Self> {
        let http = client_config.build_http_client()?;
        Ok(Self {
            repo,
            cipher,
            client_config,
            http,
        })
    }

    pub fn repository(&self) -> &Arc<dyn ConnectionRepository> {
        &self.repo
    }

    /// Encrypt the token and store (or replace) the user's connection
    pub async fn connect(&self, new: NewConnection) -> Result<MailchimpConnection> {
        let encrypted = self.cipher.encrypt_string(&new.access_token)?;
        let connection = MailchimpConnection::new(new, encrypted);
        let stored = self.repo.upsert(&connection).await?;

        info!(
            user_id = %stored.user_id,
            account_id = %stored.account_id,
            server_prefix = %stored.server_prefix,
            "Mailchimp account connected"
        );
        Ok(stored)
    }

    pub async fn status(&self, user_id: &str) -> Result<ConnectionStatus> {
        Ok(self
            .repo
            .find_by_user(user_id)
            .await?
            .as_ref()
            .map(ConnectionStatus::from)
            .unwrap_or_else(ConnectionStatus::disconnected))
    }

    /// Returns whether there was anything to remove
    pub async fn disconnect(&self, user_id: &str) -> Result<bool> {
        let removed = self.repo.delete_by_user(user_id).await?;
        if removed {
            info!(user_id = %user_id, "Mailchimp account disconnected");
        }
        Ok(removed)
    }

    /// DAL bound to the user's decrypted token, or `NotConnected`
    pub async fn client_for_user(&self, user_id: &str) -> Result<MailchimpDal> {
        let connection = self
            .repo
            .find_active_by_user(user_id)
            .await?
            .ok_or(PlatformError::NotConnected)?;
        self.dal_for(&connection)
    }

    fn dal_for(&self, connection: &MailchimpConnection) -> Result<MailchimpDal> {
        let token = self.cipher.decrypt_string(&connection.access_token_encrypted)?;
        let client = MailchimpFetchClient::with_http_client(
            self.http.clone(),
            &self.client_config,
            token,
            &connection.server_prefix,
        )?;
        Ok(MailchimpDal::new(client))
    }

    /// Ping Mailchimp with the stored token. A rejected token deactivates
    /// the connection so the UI can ask for a reconnect.
    pub async fn validate(&self, user_id: &str) -> Result<MailchimpResponse<PingResponse>> {
        let dal = self.client_for_user(user_id).await?;
        match dal.ping().await {
            Ok(response) => {
                self.repo.touch_validated(user_id).await?;
                Ok(response)
            }
            Err(e) if e.is_auth() => {
                warn!(user_id = %user_id, error = %e, "Mailchimp rejected stored token");
                self.repo.deactivate(user_id).await?;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SqliteConnectionRepository;
    use sqlx::sqlite::SqlitePoolOptions;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(api_base_url: Option<String>) -> ConnectionService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = SqliteConnectionRepository::new(pool);
        repo.migrate().await.unwrap();

        let config = MailchimpClientConfig {
            api_base_url,
            ..Default::default()
        };
        ConnectionService::new(Arc::new(repo), TokenCipher::new(&"k".repeat(32)).unwrap(), config)
            .unwrap()
    }

    fn new_connection(user_id: &str) -> NewConnection {
        NewConnection {
            user_id: user_id.to_string(),
            access_token: "plain-token".to_string(),
            server_prefix: "us6".to_string(),
            account_id: "8d3a3db4".to_string(),
            account_name: "Freddie's Jokes".to_string(),
            login_email: Some("freddie@example.com".to_string()),
            api_endpoint: None,
        }
    }

    #[tokio::test]
    async fn test_token_is_stored_encrypted() {
        let service = service(None).await;
        let stored = service.connect(new_connection("user-1")).await.unwrap();

        assert_ne!(stored.access_token_encrypted, "plain-token");
        assert!(!stored.access_token_encrypted.contains("plain-token"));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let service = service(None).await;
        let status = service.status("user-1").await.unwrap();
        assert!(!status.connected);
        assert!(!status.needs_reconnect);

        service.connect(new_connection("user-1")).await.unwrap();
        let status = service.status("user-1").await.unwrap();
        assert!(status.connected);
        assert_eq!(status.account_name.as_deref(), Some("Freddie's Jokes"));

        assert!(service.disconnect("user-1").await.unwrap());
        assert!(!service.disconnect("user-1").await.unwrap());
        assert!(!service.status("user-1").await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_client_requires_connection() {
        let service = service(None).await;
        let err = service.client_for_user("nobody").await.unwrap_err();
        assert!(matches!(err, PlatformError::NotConnected));
    }

    #[tokio::test]
    async fn test_validate_uses_decrypted_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3.0/ping"))
            .and(header("Authorization", "Bearer plain-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "health_status": "Everything's Chimpy!"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let service = service(Some(format!("{}/3.0", mock_server.uri()))).await;
        service.connect(new_connection("user-1")).await.unwrap();

        let response = service.validate("user-1").await.unwrap();
        assert_eq!(response.data.health_status, "Everything's Chimpy!");
        assert!(service.status("user-1").await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_revoked_token_deactivates_connection() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3.0/ping"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "title": "API Key Invalid",
                "status": 401,
                "detail": "Your API key may be invalid."
            })))
            .mount(&mock_server)
            .await;

        let service = service(Some(format!("{}/3.0", mock_server.uri()))).await;
        service.connect(new_connection("user-1")).await.unwrap();

        let err = service.validate("user-1").await.unwrap_err();
        assert_eq!(err.status().as_u16(), 401);

        let status = service.status("user-1").await.unwrap();
        assert!(!status.connected);
        assert!(status.needs_reconnect);
        assert!(matches!(
            service.client_for_user("user-1").await,
            Err(PlatformError::NotConnected)
        ));
    }
}
