use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Provider, SecretsError, TokenCipher};

const SECRETS_FILE: &str = "secrets.enc";

/// Stores secrets in a single AES-256-GCM encrypted JSON file.
///
/// The whole map is re-encrypted and written on every change; reads are
/// served from memory.
pub struct EncryptedProvider {
    cipher: TokenCipher,
    path: PathBuf,
    secrets: RwLock<HashMap<String, String>>,
}

impl EncryptedProvider {
    pub async fn new(key: &str, data_dir: &Path) -> Result<Self, SecretsError> {
        let cipher = TokenCipher::new(key)?;
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(SECRETS_FILE);

        let secrets = if tokio::fs::try_exists(&path).await? {
            let encoded = tokio::fs::read_to_string(&path).await?;
            let plaintext = cipher.decrypt(&encoded)?;
            serde_json::from_slice(&plaintext)?
        } else {
            HashMap::new()
        };

        debug!(path = %path.display(), count = secrets.len(), "Loaded encrypted secrets");

        Ok(Self {
            cipher,
            path,
            secrets: RwLock::new(secrets),
        })
    }

    async fn persist(&self, secrets: &HashMap<String, String>) -> Result<(), SecretsError> {
        let plaintext = serde_json::to_vec(secrets)?;
        let encoded = self.cipher.encrypt(&plaintext)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, encoded).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Provider for EncryptedProvider {
    async fn get(&self, key: &str) -> Result<String, SecretsError> {
        self.secrets
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SecretsError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SecretsError> {
        let mut secrets = self.secrets.write().await;
        secrets.insert(key.to_string(), value.to_string());
        self.persist(&secrets).await
    }

    async fn delete(&self, key: &str) -> Result<(), SecretsError> {
        let mut secrets = self.secrets.write().await;
        if secrets.remove(key).is_none() {
            return Err(SecretsError::NotFound(key.to_string()));
        }
        self.persist(&secrets).await
    }

    fn name(&self) -> &str {
        "encrypted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key = TokenCipher::generate_key();

        let provider = EncryptedProvider::new(&key, dir.path()).await.unwrap();
        provider.set("mailchimp/client-secret", "s3cret").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(SECRETS_FILE)).unwrap();
        assert!(!raw.contains("s3cret"));

        let reopened = EncryptedProvider::new(&key, dir.path()).await.unwrap();
        assert_eq!(reopened.get("mailchimp/client-secret").await.unwrap(), "s3cret");
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let provider = EncryptedProvider::new(&TokenCipher::generate_key(), dir.path()).await.unwrap();

        provider.set("a", "1").await.unwrap();
        provider.delete("a").await.unwrap();
        assert!(matches!(provider.get("a").await, Err(SecretsError::NotFound(_))));
        assert!(matches!(provider.delete("a").await, Err(SecretsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_wrong_key_cannot_open() {
        let dir = tempfile::tempdir().unwrap();
        let provider = EncryptedProvider::new(&TokenCipher::generate_key(), dir.path()).await.unwrap();
        provider.set("a", "1").await.unwrap();

        let result = EncryptedProvider::new(&TokenCipher::generate_key(), dir.path()).await;
        assert!(matches!(result, Err(SecretsError::DecryptionError(_))));
    }
}
