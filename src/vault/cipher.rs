//! Symmetric encryption of secrets at rest.
//!
//! AES-256-GCM with a fresh random 96-bit nonce for every call. Ciphertext
//! and nonce are returned separately, both base64-encoded. The GCM tag means
//! a wrong key, a wrong nonce or a tampered ciphertext is always reported as
//! [`AuthError::Decryption`] instead of yielding garbage.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::config::EncryptionKey;
use crate::error::AuthError;

const NONCE_LEN: usize = 12;

/// One encrypted value and the nonce it was sealed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Base64 ciphertext (including the authentication tag)
    pub ciphertext: String,
    /// Base64 nonce
    pub iv: String,
}

/// Encrypts and decrypts strings under the process-wide key.
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    /// Create a cipher for `key`.
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.bytes())),
        }
    }

    /// Encrypt `plaintext` under a newly generated nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedField, AuthError> {
        let mut iv = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| AuthError::InvalidInput("value too large to encrypt".to_string()))?;

        Ok(EncryptedField {
            ciphertext: BASE64.encode(ciphertext),
            iv: BASE64.encode(iv),
        })
    }

    /// Decrypt a value produced by [`SecretCipher::encrypt`].
    pub fn decrypt(&self, ciphertext_b64: &str, iv_b64: &str) -> Result<String, AuthError> {
        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|_| AuthError::Decryption)?;
        let iv = BASE64.decode(iv_b64).map_err(|_| AuthError::Decryption)?;
        if iv.len() != NONCE_LEN {
            return Err(AuthError::Decryption);
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| AuthError::Decryption)?;
        String::from_utf8(plaintext).map_err(|_| AuthError::Decryption)
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher([REDACTED])")
    }
}
