//! At-rest encryption for OAuth tokens.
//!
//! AES-256-GCM with a process-held key. The sealed form is
//! `base64(nonce || ciphertext)`; the key id travels in its own column
//! so keys can rotate without re-sealing history in place.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::MailConfig;

/// GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Seals and opens token strings with a single process-global key.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
    key_id: String,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material through Debug.
        f.debug_struct("TokenCipher")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Build from a base64-encoded 32-byte key.
    pub fn new(base64_key: &str, key_id: impl Into<String>) -> DomainResult<Self> {
        let key_bytes = BASE64
            .decode(base64_key.trim())
            .map_err(|e| DomainError::CryptoError(format!("invalid encryption key: {e}")))?;
        if key_bytes.len() != 32 {
            return Err(DomainError::CryptoError(format!(
                "encryption key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
            key_id: key_id.into(),
        })
    }

    pub fn from_config(config: &MailConfig) -> DomainResult<Self> {
        Self::new(&config.encryption_key, config.encryption_key_id.clone())
    }

    /// Key id to store alongside sealed columns.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Seal a plaintext token.
    pub fn encrypt(&self, plaintext: &str) -> DomainResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| DomainError::CryptoError("encryption failed".into()))?;
        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Open a sealed token.
    pub fn decrypt(&self, sealed: &str) -> DomainResult<String> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|_| DomainError::CryptoError("sealed token is not valid base64".into()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(DomainError::CryptoError("sealed token too short".into()));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DomainError::CryptoError("decryption failed".into()))?;
        String::from_utf8(plaintext)
            .map_err(|_| DomainError::CryptoError("decrypted token is not UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> TokenCipher {
        let key = BASE64.encode([7u8; 32]);
        TokenCipher::new(&key, "k-test").unwrap()
    }

    #[test]
    fn round_trips_a_token() {
        let cipher = test_cipher();
        let sealed = cipher.encrypt("ya29.a0AfH6-refresh-token").unwrap();
        assert_ne!(sealed, "ya29.a0AfH6-refresh-token");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "ya29.a0AfH6-refresh-token");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let cipher = test_cipher();
        let sealed = cipher.encrypt("secret").unwrap();
        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = BASE64.encode(bytes);
        assert!(cipher.decrypt(&tampered).is_err());
    }

    #[test]
    fn rejects_short_keys() {
        let short = BASE64.encode([1u8; 16]);
        assert!(TokenCipher::new(&short, "k").is_err());
    }
}
