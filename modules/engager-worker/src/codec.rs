//! At-rest encryption for per-account credential bundles.
//!
//! Scheme: AES-256-GCM with a key derived as SHA-256 of the process-wide
//! secret. Each encryption draws a fresh 96-bit nonce; the stored form is
//! lowercase hex of `nonce || ciphertext || tag`.
//!
//! Every account shares the one key and there is no per-account salt, so
//! rotating the secret invalidates every stored credential at the same time.
//! After a rotation each account decrypts as unusable until it logs in again.

use std::fmt;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use engager_common::Credential;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("ciphertext is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("ciphertext too short ({0} bytes)")]
    Truncated(usize),

    #[error("authentication failed (wrong key or tampered ciphertext)")]
    Decrypt,

    #[error("encryption failed")]
    Encrypt,

    #[error("credential bundle is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct CredentialCodec {
    cipher: Aes256Gcm,
}

impl CredentialCodec {
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn encrypt(&self, credential: &Credential) -> Result<String, CodecError> {
        let plaintext = serde_json::to_vec(credential)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| CodecError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Any failure here means the account has no usable credential.
    pub fn decrypt(&self, encrypted: &str) -> Result<Credential, CodecError> {
        let raw = hex::decode(encrypted.trim())?;
        // 16-byte GCM tag must follow the nonce even for an empty plaintext
        if raw.len() < NONCE_LEN + 16 {
            return Err(CodecError::Truncated(raw.len()));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CodecError::Decrypt)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialCodec { key: [redacted] }")
    }
}
