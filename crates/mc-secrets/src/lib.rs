//! Mailchimp Dashboard Secrets Management
//!
//! Provides:
//! - `TokenCipher`: AES-256-GCM encryption for OAuth access tokens at rest
//! - A unified `Provider` interface for secret lookup:
//!   - Environment variables (default)
//!   - Encrypted local file storage

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

mod cipher;
mod encrypted;
mod env;

pub use cipher::TokenCipher;
pub use encrypted::EncryptedProvider;
pub use env::EnvProvider;

#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secret not found: {0}")]
    NotFound(String),
    #[error("Invalid key format: {0}")]
    InvalidKey(String),
    #[error("Encryption error: {0}")]
    EncryptionError(String),
    #[error("Decryption error: {0}")]
    DecryptionError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Configuration for secrets providers
#[derive(Debug, Clone)]
pub struct SecretsConfig {
    pub provider: String,
    pub encryption_key: Option<String>,
    pub data_dir: PathBuf,
    /// Prefix prepended to environment variable names by the env provider
    pub env_prefix: Option<String>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: "env".to_string(),
            encryption_key: None,
            data_dir: PathBuf::from("./data/secrets"),
            env_prefix: None,
        }
    }
}

/// Secrets provider trait
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get a secret by key
    async fn get(&self, key: &str) -> Result<String, SecretsError>;

    /// Set a secret
    async fn set(&self, key: &str, value: &str) -> Result<(), SecretsError>;

    /// Delete a secret
    async fn delete(&self, key: &str) -> Result<(), SecretsError>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Look up a secret, treating "not found" as `None`
pub async fn get_optional(provider: &dyn Provider, key: &str) -> Result<Option<String>, SecretsError> {
    match provider.get(key).await {
        Ok(v) => Ok(Some(v)),
        Err(SecretsError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Create a provider based on configuration
pub async fn create_provider(config: &SecretsConfig) -> Result<Arc<dyn Provider>, SecretsError> {
    match config.provider.as_str() {
        "env" => {
            info!("Using environment variable secrets provider");
            Ok(Arc::new(EnvProvider::with_prefix(config.env_prefix.clone())))
        }
        "encrypted" => {
            let key = config.encryption_key.as_ref()
                .ok_or_else(|| SecretsError::ProviderError("Encryption key required for encrypted provider".to_string()))?;
            info!(dir = %config.data_dir.display(), "Using encrypted file secrets provider");
            let provider = EncryptedProvider::new(key, &config.data_dir).await?;
            Ok(Arc::new(provider))
        }
        other => Err(SecretsError::ProviderError(format!("Unknown provider: {}", other))),
    }
}
