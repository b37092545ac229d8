use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use utoipa::ToSchema;

// ============================================================================
// Rate Limit Types
// ============================================================================

/// Quota information read from `X-RateLimit-*` response headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset: Option<DateTime<Utc>>,
    /// Seconds to wait before retrying, from `Retry-After`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl RateLimitInfo {
    pub fn is_empty(&self) -> bool {
        self.limit.is_none()
            && self.remaining.is_none()
            && self.reset.is_none()
            && self.retry_after_secs.is_none()
    }

    /// Seconds until a retry makes sense: `Retry-After` when sent, otherwise
    /// the time left until the window resets, at least one second
    pub fn retry_after_hint(&self, now: DateTime<Utc>) -> Option<u64> {
        if let Some(secs) = self.retry_after_secs {
            return Some(secs);
        }
        self.reset
            .map(|reset| (reset - now).num_seconds().max(1) as u64)
    }

    /// Fraction of the quota already consumed, when both numbers are known
    pub fn usage_ratio(&self) -> Option<f64> {
        match (self.limit, self.remaining) {
            (Some(limit), Some(remaining)) if limit > 0 => {
                Some(limit.saturating_sub(remaining) as f64 / limit as f64)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Machine-readable error code carried in every failure envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    NetworkError,
    Timeout,
    ValidationError,
    InvalidResponse,
    NotConnected,
    UpstreamError,
    OauthError,
    ServiceUnavailable,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidResponse => "INVALID_RESPONSE",
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::UpstreamError => "UPSTREAM_ERROR",
            ErrorCode::OauthError => "OAUTH_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Result Envelope
// ============================================================================

/// Failure half of the tagged result envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiFailure {
    pub error: String,
    pub error_code: ErrorCode,
    pub status_code: u16,
}

impl ApiFailure {
    pub fn new(error: impl Into<String>, error_code: ErrorCode, status_code: u16) -> Self {
        Self {
            error: error.into(),
            error_code,
            status_code,
        }
    }
}

/// Tagged `{success, data | error, errorCode, statusCode}` envelope returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            rate_limit: None,
            error: None,
            error_code: None,
            status_code: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Option<RateLimitInfo>) -> Self {
        self.rate_limit = rate_limit.filter(|r| !r.is_empty());
        self
    }

    pub fn failure(failure: ApiFailure) -> Self {
        Self {
            success: false,
            data: None,
            rate_limit: None,
            error: Some(failure.error),
            error_code: Some(failure.error_code),
            status_code: Some(failure.status_code),
        }
    }

    /// Attach a payload to a failure, e.g. the health report behind a 503
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Page sizes offered by the table views
pub const ALLOWED_PAGE_SIZES: [u32; 4] = [10, 20, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page must be 1 or greater, got {0}")]
    InvalidPage(u32),

    #[error("perPage must be one of 10, 20, 50, 100, got {0}")]
    InvalidPageSize(u32),
}

/// UI-facing pagination request (`?page=&perPage=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 { 1 }
fn default_per_page() -> u32 { DEFAULT_PAGE_SIZE }

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Result<Self, PaginationError> {
        let req = Self { page, per_page };
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result<(), PaginationError> {
        if self.page < 1 {
            return Err(PaginationError::InvalidPage(self.page));
        }
        if !ALLOWED_PAGE_SIZES.contains(&self.per_page) {
            return Err(PaginationError::InvalidPageSize(self.per_page));
        }
        Ok(())
    }

    /// Upstream `count` parameter
    pub fn count(&self) -> u32 {
        self.per_page
    }

    /// Upstream `offset` parameter
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// Pagination controls rendered under every table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationMeta {
    pub fn new(request: PageRequest, total_items: u64) -> Self {
        let per_page = request.per_page.max(1) as u64;
        let total_pages = total_items.div_ceil(per_page).min(u32::MAX as u64) as u32;
        Self {
            page: request.page,
            per_page: request.per_page,
            total_items,
            total_pages,
            has_next_page: request.page < total_pages,
            has_previous_page: request.page > 1,
        }
    }
}

/// A page of rows plus its controls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            pagination: PaginationMeta::new(request, total_items),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

// ============================================================================
// Health Types
// ============================================================================

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Everything reachable
    Up,
    /// Some checks failing but the service still answers
    Degraded,
    /// Critical checks failing
    Down,
}

/// Result of a single dependency check
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    pub fn healthy(name: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            name: name.into(),
            healthy: true,
            latency_ms,
            message: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: false,
            latency_ms,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Aggregated health report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// All healthy -> UP, none healthy -> DOWN, otherwise DEGRADED
    pub fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let healthy = checks.iter().filter(|c| c.healthy).count();
        let status = if healthy == checks.len() {
            HealthStatus::Up
        } else if healthy == 0 {
            HealthStatus::Down
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            checks,
            timestamp: Utc::now(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }

    pub fn failing_checks(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().filter(|c| !c.healthy).map(|c| c.name.as_str())
    }
}
