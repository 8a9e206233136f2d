//! # In-Process Processor
//!
//! Hashing via `domain::digest`, authenticated encryption via AES-256-GCM
//! or XChaCha20-Poly1305.
//!
//! ## Sealed layout
//!
//! `nonce || ciphertext || tag`. The nonce is drawn fresh from the thread
//! RNG for every call (12 bytes for AES-GCM, 24 for XChaCha20).

use std::path::Path;

use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::XChaCha20Poly1305;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::algorithms::{CipherAlgorithm, HashAlgorithm};
use crate::domain::digest;
use crate::domain::errors::ArchiveError;
use crate::ports::outbound::ContentProcessor;

/// Encryption key length in bytes (256-bit).
pub const KEY_LEN: usize = 32;

/// Secret key (256-bit), wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Decode a base64 key; it must decode to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, ArchiveError> {
        let mut raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ArchiveError::Crypto {
                reason: format!("key is not valid base64: {e}"),
            })?;

        if raw.len() != KEY_LEN {
            let len = raw.len();
            raw.zeroize();
            return Err(ArchiveError::Crypto {
                reason: format!("key must be {KEY_LEN} bytes, got {len}"),
            });
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self(bytes))
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Base64 form, as accepted by `from_base64`.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Hashing and encryption inside the calling process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcessor;

impl LocalProcessor {
    /// Seal `plaintext` under an already-decoded key.
    pub fn seal(
        key: &SecretKey,
        plaintext: &[u8],
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError> {
        let mut nonce = vec![0u8; algorithm.nonce_len()];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce);

        let ciphertext = match algorithm {
            CipherAlgorithm::Aes256Gcm => Aes256Gcm::new(key.as_bytes().into())
                .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext),
            CipherAlgorithm::XChaCha20Poly1305 => XChaCha20Poly1305::new(key.as_bytes().into())
                .encrypt(chacha20poly1305::XNonce::from_slice(&nonce), plaintext),
        }
        .map_err(|e| ArchiveError::Crypto {
            reason: format!("{algorithm} encryption failed: {e}"),
        })?;

        nonce.extend_from_slice(&ciphertext);
        Ok(nonce)
    }

    /// Inverse of `seal`. A short input or a bad tag is
    /// `AuthenticationFailed`.
    pub fn open(
        key: &SecretKey,
        sealed: &[u8],
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError> {
        let nonce_len = algorithm.nonce_len();
        if sealed.len() < nonce_len {
            return Err(ArchiveError::AuthenticationFailed {
                reason: format!(
                    "sealed data too short for {algorithm}: {} bytes",
                    sealed.len()
                ),
            });
        }
        let (nonce, ciphertext) = sealed.split_at(nonce_len);

        match algorithm {
            CipherAlgorithm::Aes256Gcm => Aes256Gcm::new(key.as_bytes().into())
                .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext),
            CipherAlgorithm::XChaCha20Poly1305 => XChaCha20Poly1305::new(key.as_bytes().into())
                .decrypt(chacha20poly1305::XNonce::from_slice(nonce), ciphertext),
        }
        .map_err(|e| ArchiveError::AuthenticationFailed {
            reason: format!("{algorithm} tag mismatch: {e}"),
        })
    }
}

impl ContentProcessor for LocalProcessor {
    fn digest_file(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, ArchiveError> {
        digest::digest_file(algorithm, path).map_err(|e| ArchiveError::io(path, e))
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &str,
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError> {
        Self::seal(&SecretKey::from_base64(key)?, plaintext, algorithm)
    }

    fn decrypt(
        &self,
        sealed: &[u8],
        key: &str,
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError> {
        Self::open(&SecretKey::from_base64(key)?, sealed, algorithm)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
