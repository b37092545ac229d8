//! Platform Services

pub mod connection;
pub mod health;
pub mod identity;
pub mod oauth;

pub use connection::{client_config, ConnectionService};
pub use health::HealthService;
pub use identity::{
    generate_code_challenge, generate_code_verifier, generate_random_string, IdentityConfig,
    IdentityService, TokenSet,
};
pub use oauth::{MailchimpOAuthConfig, MailchimpOAuthService, OAuthMetadata, TokenResponse};
