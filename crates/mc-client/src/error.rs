//! Mailchimp client error hierarchy

use chrono::Utc;
use mc_common::{ApiFailure, ErrorCode, RateLimitInfo};
use thiserror::Error;

/// Retry-After sent on a 429 when Mailchimp gave neither `Retry-After` nor a reset time
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// A request parameter failed validation before any network call was made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid parameter '{field}': {message}")]
pub struct SchemaError {
    pub field: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MailchimpError {
    /// Non-2xx response other than 401/403/429, or a 2xx body that does not match its schema
    #[error("{message}")]
    Fetch {
        status: u16,
        message: String,
        invalid_response: bool,
    },

    /// 401 or 403: token revoked, expired, or lacking access
    #[error("{message}")]
    Auth { status: u16, message: String },

    /// 429: account quota exhausted
    #[error("{message}")]
    RateLimit {
        message: String,
        rate_limit: RateLimitInfo,
    },

    /// No HTTP response at all: DNS, TLS, connection reset, or timeout
    #[error("{message}")]
    Network { message: String, timed_out: bool },

    #[error(transparent)]
    InvalidRequest(#[from] SchemaError),
}

impl MailchimpError {
    pub fn fetch(status: u16, message: impl Into<String>) -> Self {
        Self::Fetch {
            status,
            message: message.into(),
            invalid_response: false,
        }
    }

    pub fn invalid_response(status: u16, message: impl Into<String>) -> Self {
        Self::Fetch {
            status,
            message: message.into(),
            invalid_response: true,
        }
    }

    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Self::Auth {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Status reported in the failure envelope
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Fetch { status, .. } => *status,
            Self::Auth { status, .. } => *status,
            Self::RateLimit { .. } => 429,
            Self::Network { timed_out: true, .. } => 504,
            Self::Network { .. } => 503,
            Self::InvalidRequest(_) => 400,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Fetch { invalid_response: true, .. } => ErrorCode::InvalidResponse,
            Self::Fetch { .. } if self.is_not_found() => ErrorCode::NotFound,
            Self::Fetch { .. } => ErrorCode::UpstreamError,
            Self::Auth { status: 403, .. } => ErrorCode::Forbidden,
            Self::Auth { .. } => ErrorCode::Unauthorized,
            Self::RateLimit { .. } => ErrorCode::RateLimited,
            Self::Network { timed_out: true, .. } => ErrorCode::Timeout,
            Self::Network { .. } => ErrorCode::NetworkError,
            Self::InvalidRequest(_) => ErrorCode::ValidationError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimit { .. } => true,
            Self::Fetch { status, invalid_response, .. } => !invalid_response && *status >= 500,
            Self::Auth { .. } | Self::InvalidRequest(_) => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Upstream 404, or a message following the "not found" pattern
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Fetch { status: 404, .. } => true,
            Self::Fetch { message, invalid_response: false, .. } => {
                let lower = message.to_lowercase();
                lower.contains("not found") || lower.contains("404")
            }
            _ => false,
        }
    }

    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        match self {
            Self::RateLimit { rate_limit, .. } => Some(rate_limit),
            _ => None,
        }
    }

    /// Seconds a caller should wait after a 429. Falls back to
    /// `DEFAULT_RETRY_AFTER_SECS` when Mailchimp gave no timing headers.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimit { rate_limit, .. } => Some(
                rate_limit
                    .retry_after_hint(Utc::now())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            ),
            _ => None,
        }
    }

    pub fn to_api_failure(&self) -> ApiFailure {
        ApiFailure::new(self.to_string(), self.error_code(), self.status_code())
    }

    pub fn into_api_failure(self) -> ApiFailure {
        self.to_api_failure()
    }
}

pub type Result<T> = std::result::Result<T, MailchimpError>;
