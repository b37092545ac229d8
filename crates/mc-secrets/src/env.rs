use async_trait::async_trait;

use crate::{Provider, SecretsError};

/// Reads secrets from environment variables.
///
/// Keys are normalised to variable names: `mailchimp/client-secret` becomes
/// `MAILCHIMP_CLIENT_SECRET` (or `{PREFIX}_MAILCHIMP_CLIENT_SECRET` with a prefix).
/// The process environment is treated as read-only.
pub struct EnvProvider {
    prefix: Option<String>,
}

impl EnvProvider {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    pub fn var_name(&self, key: &str) -> String {
        let normalised: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.trim_end_matches('_'), normalised),
            None => normalised,
        }
    }
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for EnvProvider {
    async fn get(&self, key: &str) -> Result<String, SecretsError> {
        let var = self.var_name(key);
        std::env::var(&var)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(SecretsError::NotFound(var))
    }

    async fn set(&self, key: &str, _value: &str) -> Result<(), SecretsError> {
        Err(SecretsError::ProviderError(format!(
            "environment provider is read-only (tried to set {})",
            self.var_name(key)
        )))
    }

    async fn delete(&self, key: &str) -> Result<(), SecretsError> {
        Err(SecretsError::ProviderError(format!(
            "environment provider is read-only (tried to delete {})",
            self.var_name(key)
        )))
    }

    fn name(&self) -> &str {
        "env"
    }
}
