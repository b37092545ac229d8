//! Platform Error Types
//!
//! Every error leaves the HTTP layer as the tagged failure envelope
//! `{success: false, error, errorCode, statusCode}`.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mc_client::{MailchimpError, SchemaError};
use mc_common::{ApiFailure, ApiResponse, ErrorCode, PaginationError};
use mc_secrets::SecretsError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("No active Mailchimp connection. Connect your Mailchimp account first.")]
    NotConnected,

    #[error("OAuth error: {message}")]
    OAuth { message: String },

    #[error(transparent)]
    Mailchimp(#[from] MailchimpError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn oauth(message: impl Into<String>) -> Self {
        Self::OAuth { message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        let code = match self {
            Self::Validation { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } | Self::NotConnected => 403,
            Self::NotFound { .. } => 404,
            Self::OAuth { .. } => 400,
            Self::Mailchimp(e) => mailchimp_status(e),
            Self::Database(_) | Self::Secrets(_) | Self::Configuration { .. } | Self::Internal { .. } => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::NotConnected => ErrorCode::NotConnected,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::OAuth { .. } => ErrorCode::OauthError,
            Self::Mailchimp(e) => e.error_code(),
            Self::Database(_) | Self::Secrets(_) | Self::Configuration { .. } | Self::Internal { .. } => {
                ErrorCode::InternalError
            }
        }
    }

    /// Message safe to show to the end user; internal details stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Secrets(_) | Self::Configuration { .. } | Self::Internal { .. } => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_api_failure(&self) -> ApiFailure {
        ApiFailure::new(self.public_message(), self.error_code(), self.status().as_u16())
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Mailchimp(e) => e.retry_after_secs(),
            _ => None,
        }
    }
}

/// Upstream status translated for our own clients
fn mailchimp_status(error: &MailchimpError) -> u16 {
    match error {
        MailchimpError::InvalidRequest(_) => 400,
        MailchimpError::Auth { status, .. } => *status,
        MailchimpError::RateLimit { .. } => 429,
        MailchimpError::Network { .. } => error.status_code(),
        MailchimpError::Fetch { invalid_response: true, .. } => 502,
        MailchimpError::Fetch { .. } if error.is_not_found() => 404,
        MailchimpError::Fetch { status, .. } if (400..500).contains(status) => *status,
        MailchimpError::Fetch { .. } => 502,
    }
}

impl From<SchemaError> for PlatformError {
    fn from(e: SchemaError) -> Self {
        Self::Mailchimp(MailchimpError::InvalidRequest(e))
    }
}

impl From<PaginationError> for PlatformError {
    fn from(e: PaginationError) -> Self {
        Self::validation(e.to_string())
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && !matches!(self, Self::Mailchimp(_)) {
            error!(error = %self, "Request failed");
        }

        let retry_after = self.retry_after_secs();
        let body = ApiResponse::<()>::failure(self.to_api_failure());
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
