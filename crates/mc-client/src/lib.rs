//! Typed client for the Mailchimp Marketing API v3
//!
//! - `client`: HTTP fetch wrapper with bearer auth, rate-limit parsing and error classification
//! - `dal`: one method per upstream endpoint
//! - `schemas`: request parameter validation and response payloads
//! - `retry`: exponential backoff helper shared with the OAuth flow

pub mod client;
pub mod dal;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod schemas;

pub use client::{is_valid_server_prefix, MailchimpClientConfig, MailchimpFetchClient, MailchimpResponse};
pub use dal::MailchimpDal;
pub use error::{MailchimpError, Result, SchemaError};
pub use rate_limit::parse_rate_limit_headers;
pub use retry::{retry_with_backoff, RetryPolicy};
