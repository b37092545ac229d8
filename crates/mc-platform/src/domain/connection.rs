//! Mailchimp connection entity
//!
//! One row per dashboard user. The OAuth access token is stored encrypted;
//! nothing in this module ever sees the plaintext.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq)]
pub struct MailchimpConnection {
    pub id: String,
    /// IdP subject of the owning user (unique)
    pub user_id: String,
    pub access_token_encrypted: String,
    /// Data-center prefix, e.g. `us6`
    pub server_prefix: String,
    pub account_id: String,
    pub account_name: String,
    pub login_email: Option<String>,
    pub api_endpoint: Option<String>,
    pub is_active: bool,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MailchimpConnection {
    pub fn new(new: NewConnection, access_token_encrypted: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: new.user_id,
            access_token_encrypted,
            server_prefix: new.server_prefix,
            account_id: new.account_id,
            account_name: new.account_name,
            login_email: new.login_email,
            api_endpoint: new.api_endpoint,
            is_active: true,
            last_validated_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Everything needed to store a freshly authorized connection
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub user_id: String,
    pub access_token: String,
    pub server_prefix: String,
    pub account_id: String,
    pub account_name: String,
    pub login_email: Option<String>,
    pub api_endpoint: Option<String>,
}

/// Settings-page view of a user's connection
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<DateTime<Utc>>,
    /// Present but revoked/invalid connections report `connected: false, needsReconnect: true`
    pub needs_reconnect: bool,
}

impl ConnectionStatus {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            account_id: None,
            account_name: None,
            login_email: None,
            server_prefix: None,
            connected_at: None,
            last_validated_at: None,
            needs_reconnect: false,
        }
    }
}

impl From<&MailchimpConnection> for ConnectionStatus {
    fn from(c: &MailchimpConnection) -> Self {
        Self {
            connected: c.is_active,
            account_id: Some(c.account_id.clone()),
            account_name: Some(c.account_name.clone()),
            login_email: c.login_email.clone(),
            server_prefix: Some(c.server_prefix.clone()),
            connected_at: Some(c.created_at),
            last_validated_at: c.last_validated_at,
            needs_reconnect: !c.is_active,
        }
    }
}
