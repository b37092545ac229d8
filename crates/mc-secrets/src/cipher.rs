use aes_gcm::{
    aead::{Aead, KeyInit},
    AeadCore, Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;

use crate::SecretsError;

const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32;

/// AES-256-GCM cipher for access tokens stored in the connection table.
///
/// Output is base64 of `nonce || ciphertext`, with a fresh random nonce per call,
/// so encrypting the same token twice never yields the same string.
#[derive(Clone)]
pub struct TokenCipher {
    key: Arc<[u8; KEY_LENGTH]>,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").field("key", &"<redacted>").finish()
    }
}

impl TokenCipher {
    /// Accepts a raw 32-byte key, a 64-character hex key, or base64 of 32 bytes
    pub fn new(key: &str) -> Result<Self, SecretsError> {
        let key = key.trim();
        let bytes = if key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(key).map_err(|e| SecretsError::InvalidKey(format!("invalid hex: {}", e)))?
        } else if key.len() == KEY_LENGTH {
            key.as_bytes().to_vec()
        } else {
            BASE64.decode(key).map_err(|_| {
                SecretsError::InvalidKey(
                    "key must be 32 bytes, 64 hex characters, or base64 of 32 bytes".to_string(),
                )
            })?
        };

        if bytes.len() != KEY_LENGTH {
            return Err(SecretsError::InvalidKey(format!(
                "key must decode to {} bytes, got {}",
                KEY_LENGTH,
                bytes.len()
            )));
        }

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes);
        Ok(Self { key: Arc::new(key) })
    }

    /// Random key, hex encoded (suitable for `MC_ENCRYPTION_KEY`)
    pub fn generate_key() -> String {
        let key: [u8; KEY_LENGTH] = rand::random();
        hex::encode(key)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(self.key.as_slice().into())
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, SecretsError> {
        let nonce = Aes256Gcm::generate_nonce(&mut aes_gcm::aead::OsRng);
        let ciphertext = self
            .cipher()
            .encrypt(&nonce, plaintext)
            .map_err(|e| SecretsError::EncryptionError(e.to_string()))?;

        let mut combined = nonce.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, SecretsError> {
        let data = BASE64
            .decode(encoded.trim())
            .map_err(|e| SecretsError::DecryptionError(format!("base64 decode failed: {}", e)))?;

        if data.len() <= NONCE_LENGTH {
            return Err(SecretsError::DecryptionError("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LENGTH);
        // Never echo the input: it is a stored credential.
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretsError::DecryptionError("authentication failed".to_string()))
    }

    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, SecretsError> {
        self.encrypt(plaintext.as_bytes())
    }

    pub fn decrypt_string(&self, encoded: &str) -> Result<String, SecretsError> {
        let bytes = self.decrypt(encoded)?;
        String::from_utf8(bytes).map_err(|e| SecretsError::DecryptionError(format!("invalid UTF-8: {}", e)))
    }
}
