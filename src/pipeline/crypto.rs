// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! AES-256-GCM payload encryption with scrypt key derivation.
//!
//! Every encryption draws a fresh 96-bit IV; the 128-bit tag travels next to
//! the ciphertext in the envelope. A tag that fails to verify is always an
//! error: it means the wrong passphrase or tampered bytes, and is reported
//! separately from a checksum mismatch.
//!
//! # Salts
//!
//! Each [`Keyring`] draws a random salt when it is created and derives its
//! key once. The salt is written into every envelope so any holder of the
//! passphrase can re-derive the key. Envelopes without a salt were produced
//! with [`LEGACY_SALT`], a fixed constant: every store sharing a passphrase
//! derives the same key from it, so it is only ever used to read old data.

use std::sync::Arc;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use parking_lot::Mutex;
use rand::RngCore;
use tracing::debug;

/// Salt for envelopes written before per-store salts existed.
pub const LEGACY_SALT: &[u8] = b"doc-sync/static-salt/v1";

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed")]
    EncryptFailed,

    #[error("authentication tag verification failed")]
    AuthenticationFailed,

    #[error("invalid iv or tag: {0}")]
    InvalidIv(String),

    #[error("payload is encrypted but no encryption key is configured")]
    MissingKey,
}

/// Ciphertext plus the values needed to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LEN],
    pub auth_tag: [u8; TAG_LEN],
}

/// A derived AES-256-GCM key.
pub struct DocCipher {
    cipher: Aes256Gcm,
}

impl DocCipher {
    /// Derive a key from `passphrase` and `salt` with scrypt (`2^log_n` cost).
    pub fn derive(passphrase: &str, salt: &[u8], log_n: u8) -> Result<Self, CryptoError> {
        let params = scrypt::Params::new(log_n, SCRYPT_R, SCRYPT_P, KEY_LEN)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let mut key = [0u8; KEY_LEN];
        scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        key.fill(0);
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut auth_tag = [0u8; TAG_LEN];
        auth_tag.copy_from_slice(tag.as_slice());
        Ok(Sealed { ciphertext: buffer, iv, auth_tag })
    }

    pub fn decrypt(&self, ciphertext: &[u8], iv: &[u8], auth_tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if iv.len() != IV_LEN {
            return Err(CryptoError::InvalidIv(format!("iv is {} bytes, expected {IV_LEN}", iv.len())));
        }
        if auth_tag.len() != TAG_LEN {
            return Err(CryptoError::InvalidIv(format!(
                "auth tag is {} bytes, expected {TAG_LEN}",
                auth_tag.len()
            )));
        }

        let mut buffer = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buffer, Tag::from_slice(auth_tag))
            .map_err(|_| CryptoError::AuthenticationFailed)?;
        Ok(buffer)
    }
}

/// The store's own key plus the key for the last foreign salt seen on read.
pub struct Keyring {
    passphrase: String,
    log_n: u8,
    salt: [u8; SALT_LEN],
    own: Arc<DocCipher>,
    /// One slot: a remote that keeps changing salts cannot grow it.
    foreign: Mutex<Option<(Vec<u8>, Arc<DocCipher>)>>,
}

impl Keyring {
    /// Draw a random salt and derive the store's key.
    pub fn new(passphrase: &str, log_n: u8) -> Result<Self, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::with_salt(passphrase, log_n, salt)
    }

    pub fn with_salt(passphrase: &str, log_n: u8, salt: [u8; SALT_LEN]) -> Result<Self, CryptoError> {
        if passphrase.is_empty() {
            return Err(CryptoError::MissingKey);
        }
        let own = Arc::new(DocCipher::derive(passphrase, &salt, log_n)?);
        debug!(log_n, "Derived store encryption key");
        Ok(Self {
            passphrase: passphrase.to_string(),
            log_n,
            salt,
            own,
            foreign: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
        self.own.encrypt(plaintext)
    }

    /// Decrypt an envelope written under `salt` (`None` = legacy fixed salt).
    pub fn decrypt(
        &self,
        salt: Option<&[u8]>,
        ciphertext: &[u8],
        iv: &[u8],
        auth_tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = self.cipher_for(salt.unwrap_or(LEGACY_SALT))?;
        cipher.decrypt(ciphertext, iv, auth_tag)
    }

    fn cipher_for(&self, salt: &[u8]) -> Result<Arc<DocCipher>, CryptoError> {
        if salt == self.salt.as_slice() {
            return Ok(self.own.clone());
        }
        if let Some((cached, cipher)) = self.foreign.lock().as_ref() {
            if cached.as_slice() == salt {
                return Ok(cipher.clone());
            }
        }
        // Derived outside the lock; a racing derive of the same salt is harmless.
        let cipher = Arc::new(DocCipher::derive(&self.passphrase, salt, self.log_n)?);
        *self.foreign.lock() = Some((salt.to_vec(), cipher.clone()));
        debug!(salt_len = salt.len(), "Derived key for foreign salt");
        Ok(cipher)
    }

    #[cfg(test)]
    fn cached_foreign_salt(&self) -> Option<Vec<u8>> {
        self.foreign.lock().as_ref().map(|(salt, _)| salt.clone())
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("log_n", &self.log_n)
            .field("salt", &hex::encode(self.salt))
            .finish_non_exhaustive()
    }
}
