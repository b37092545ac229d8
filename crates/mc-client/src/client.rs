//! Mailchimp fetch client
//!
//! Builds requests against `https://{dc}.api.mailchimp.com/3.0`, injects the
//! OAuth bearer token, reads rate-limit headers and classifies failures into
//! the `MailchimpError` hierarchy.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use mc_common::RateLimitInfo;
use regex::Regex;
use reqwest::header::ACCEPT;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::{MailchimpError, Result};
use crate::rate_limit::parse_rate_limit_headers;
use crate::schemas::common::ProblemDetail;

/// Fetch client configuration
#[derive(Debug, Clone)]
pub struct MailchimpClientConfig {
    /// Overrides `https://{dc}.api.mailchimp.com/3.0`; `{dc}` is substituted when present
    pub api_base_url: Option<String>,
    /// Whole-request timeout
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for MailchimpClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("mc-dashboard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl MailchimpClientConfig {
    /// Build a pooled reqwest client honouring these timeouts
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| MailchimpError::network(format!("Failed to build HTTP client: {}", e)))
    }

    pub fn base_url_for(&self, server_prefix: &str) -> String {
        match &self.api_base_url {
            Some(base) => base.replace("{dc}", server_prefix).trim_end_matches('/').to_string(),
            None => format!("https://{}.api.mailchimp.com/3.0", server_prefix),
        }
    }
}

/// Successful upstream response plus quota information
#[derive(Debug, Clone)]
pub struct MailchimpResponse<T> {
    pub data: T,
    pub rate_limit: Option<RateLimitInfo>,
    pub status: u16,
}

impl<T> MailchimpResponse<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MailchimpResponse<U> {
        MailchimpResponse {
            data: f(self.data),
            rate_limit: self.rate_limit,
            status: self.status,
        }
    }
}

fn server_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]+[0-9]+$").expect("static regex"))
}

pub fn is_valid_server_prefix(prefix: &str) -> bool {
    server_prefix_pattern().is_match(prefix)
}

/// Collapse ids out of a path so it can be used as a metrics label:
/// `/lists/abc/members/123` -> `/lists/{id}/members/{id}`
pub fn endpoint_label(path: &str) -> String {
    const COLLECTIONS: [&str; 8] = [
        "lists",
        "members",
        "campaigns",
        "reports",
        "automations",
        "emails",
        "landing-pages",
        "abuse-reports",
    ];

    let mut out = String::new();
    let mut previous_was_collection = false;
    for segment in path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        if previous_was_collection {
            out.push_str("{id}");
            previous_was_collection = false;
        } else {
            out.push_str(segment);
            previous_was_collection = COLLECTIONS.contains(&segment);
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

pub struct MailchimpFetchClient {
    http: reqwest::Client,
    base_url: String,
    server_prefix: String,
    access_token: String,
}

impl std::fmt::Debug for MailchimpFetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailchimpFetchClient")
            .field("base_url", &self.base_url)
            .field("server_prefix", &self.server_prefix)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl MailchimpFetchClient {
    pub fn new(
        config: &MailchimpClientConfig,
        access_token: impl Into<String>,
        server_prefix: &str,
    ) -> Result<Self> {
        let http = config.build_http_client()?;
        Self::with_http_client(http, config, access_token, server_prefix)
    }

    /// Reuse an existing connection pool
    pub fn with_http_client(
        http: reqwest::Client,
        config: &MailchimpClientConfig,
        access_token: impl Into<String>,
        server_prefix: &str,
    ) -> Result<Self> {
        let server_prefix = server_prefix.trim().to_lowercase();
        if !is_valid_server_prefix(&server_prefix) {
            return Err(MailchimpError::auth(
                401,
                format!("Invalid Mailchimp server prefix '{}'", server_prefix),
            ));
        }

        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(MailchimpError::auth(401, "Missing Mailchimp access token"));
        }

        Ok(Self {
            http,
            base_url: config.base_url_for(&server_prefix),
            server_prefix,
            access_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn server_prefix(&self) -> &str {
        &self.server_prefix
    }

    /// GET `path` (relative to the API root) and decode the JSON body into `T`
    pub async fn get<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<MailchimpResponse<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let label = endpoint_label(path);
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, "application/json");
        if let Some(query) = query {
            request = request.query(query);
        }

        let result = self.execute::<T>(request, &label).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.error_code().as_str(),
        };
        let elapsed = started.elapsed();
        metrics::counter!("mailchimp_requests_total", "endpoint" => label.clone(), "outcome" => outcome)
            .increment(1);
        metrics::histogram!("mailchimp_request_duration_seconds", "endpoint" => label.clone())
            .record(elapsed.as_secs_f64());

        match &result {
            Ok(response) => {
                if let Some(remaining) = response.rate_limit.as_ref().and_then(|r| r.remaining) {
                    metrics::gauge!("mailchimp_rate_limit_remaining").set(remaining as f64);
                }
                debug!(
                    endpoint = %label,
                    status = response.status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Mailchimp request completed"
                );
            }
            Err(e) => {
                warn!(
                    endpoint = %label,
                    status = e.status_code(),
                    error_code = %e.error_code(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Mailchimp request failed"
                );
            }
        }

        result
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        label: &str,
    ) -> Result<MailchimpResponse<T>> {
        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status().as_u16();
        let rate_limit = parse_rate_limit_headers(response.headers());

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, rate_limit));
        }

        let bytes = response.bytes().await.map_err(classify_transport_error)?;
        let data = serde_json::from_slice::<T>(&bytes).map_err(|e| {
            MailchimpError::invalid_response(
                status,
                format!("Invalid response format from {}: {}", label, e),
            )
        })?;

        Ok(MailchimpResponse {
            data,
            rate_limit,
            status,
        })
    }
}

pub(crate) fn classify_transport_error(error: reqwest::Error) -> MailchimpError {
    if error.is_timeout() {
        MailchimpError::timeout("Request to Mailchimp timed out")
    } else if error.is_decode() {
        MailchimpError::invalid_response(200, format!("Failed to read Mailchimp response: {}", error))
    } else {
        MailchimpError::network(format!("Network error contacting Mailchimp: {}", error.without_url()))
    }
}

/// Map a non-2xx status and its RFC 7807 body to the error hierarchy
pub(crate) fn classify_status(
    status: u16,
    body: &str,
    rate_limit: Option<RateLimitInfo>,
) -> MailchimpError {
    let problem = serde_json::from_str::<ProblemDetail>(body).ok();
    let upstream_message = problem.as_ref().and_then(ProblemDetail::message);

    match status {
        401 => MailchimpError::auth(
            401,
            upstream_message
                .unwrap_or_else(|| "Mailchimp access token is invalid or has been revoked".to_string()),
        ),
        403 => MailchimpError::auth(
            403,
            upstream_message
                .unwrap_or_else(|| "Access to this Mailchimp resource is forbidden".to_string()),
        ),
        429 => MailchimpError::RateLimit {
            message: upstream_message
                .unwrap_or_else(|| "Mailchimp rate limit exceeded, please retry later".to_string()),
            rate_limit: rate_limit.unwrap_or_default(),
        },
        _ => MailchimpError::fetch(
            status,
            upstream_message
                .unwrap_or_else(|| format!("Mailchimp API request failed with status {}", status)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_common::ErrorCode;

    #[test]
    fn test_server_prefix_validation() {
        assert!(is_valid_server_prefix("us1"));
        assert!(is_valid_server_prefix("us21"));
        assert!(!is_valid_server_prefix("US1"));
        assert!(!is_valid_server_prefix("us"));
        assert!(!is_valid_server_prefix("us1.evil.com/"));
        assert!(!is_valid_server_prefix(""));
    }

    #[test]
    fn test_base_url() {
        let config = MailchimpClientConfig::default();
        assert_eq!(config.base_url_for("us6"), "https://us6.api.mailchimp.com/3.0");

        let overridden = MailchimpClientConfig {
            api_base_url: Some("http://127.0.0.1:4010/{dc}/3.0/".to_string()),
            ..Default::default()
        };
        assert_eq!(overridden.base_url_for("us6"), "http://127.0.0.1:4010/us6/3.0");
    }

    #[test]
    fn test_new_rejects_bad_input() {
        let config = MailchimpClientConfig::default();
        assert!(MailchimpFetchClient::new(&config, "token", "not a dc").is_err());
        assert!(MailchimpFetchClient::new(&config, "  ", "us1").is_err());

        let client = MailchimpFetchClient::new(&config, "token", "US2").unwrap();
        assert_eq!(client.server_prefix(), "us2");
        assert!(!format!("{:?}", client).contains("token\""));
    }

    #[test]
    fn test_endpoint_label() {
        assert_eq!(endpoint_label("/"), "/");
        assert_eq!(endpoint_label("/lists"), "/lists");
        assert_eq!(endpoint_label("/lists/abc123/members/deadbeef"), "/lists/{id}/members/{id}");
        assert_eq!(endpoint_label("/reports/c1/open-details"), "/reports/{id}/open-details");
        assert_eq!(endpoint_label("/reporting/landing-pages/lp1"), "/reporting/landing-pages/{id}");
        assert_eq!(endpoint_label("/automations/a1/emails"), "/automations/{id}/emails");
    }

    #[test]
    fn test_classify_status() {
        let body = r#"{"type":"https://mailchimp.com/developer/","title":"Resource Not Found","status":404,"detail":"The requested resource could not be found.","instance":"abc"}"#;
        let err = classify_status(404, body, None);
        assert_eq!(err.error_code(), ErrorCode::NotFound);
        assert_eq!(err.to_string(), "The requested resource could not be found.");

        let err = classify_status(401, "", None);
        assert!(err.is_auth());
        assert_eq!(err.status_code(), 401);

        let err = classify_status(403, "{}", None);
        assert_eq!(err.error_code(), ErrorCode::Forbidden);

        let err = classify_status(
            429,
            "",
            Some(RateLimitInfo { retry_after_secs: Some(10), ..Default::default() }),
        );
        assert_eq!(err.rate_limit().and_then(|r| r.retry_after_secs), Some(10));

        let err = classify_status(502, "<html>bad gateway</html>", None);
        assert_eq!(err.status_code(), 502);
        assert!(err.is_retryable());
    }
}
