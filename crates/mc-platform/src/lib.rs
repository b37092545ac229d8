//! Mailchimp Dashboard Platform
//!
//! - Dashboard login against an OIDC identity provider (session cookie)
//! - Mailchimp OAuth connection per user, access token encrypted at rest
//! - Read-only Mailchimp analytics proxy with UI pagination and chart views
//! - Health probes and OpenAPI documentation

pub mod api;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

pub use api::{build_router, AppState};
pub use domain::*;
pub use error::{PlatformError, Result};
