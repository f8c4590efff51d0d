//! Envelope encryption for credential and configuration blobs.
//!
//! Envelope layout (base64, standard alphabet):
//!
//! ```text
//! IV (12 bytes) | AuthTag (16 bytes) | Ciphertext
//! ```
//!
//! The plaintext is the UTF-8 JSON serialization of the sealed value.

use std::fmt;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encryption key must be {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("encryption key is not valid hex: {0}")]
    InvalidHexKey(String),
    #[error("malformed envelope: {0}")]
    InvalidEnvelope(String),
    #[error("payload could not be sealed")]
    Encryption,
    #[error("authentication tag mismatch (tampered envelope or wrong key)")]
    Decryption,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Seals and opens credential envelopes with a process-wide AES-256-GCM key.
#[derive(Clone)]
pub struct CredentialCodec {
    cipher: Aes256Gcm,
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec").finish_non_exhaustive()
    }
}

impl CredentialCodec {
    /// Build a codec from 32 raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, CodecError> {
        if key.len() != KEY_LEN {
            return Err(CodecError::InvalidKeyLength(key.len()));
        }
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| CodecError::InvalidKeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    /// Build a codec from a 64 character hex string.
    pub fn from_hex(key_hex: &str) -> Result<Self, CodecError> {
        let key = hex::decode(key_hex.trim()).map_err(|e| CodecError::InvalidHexKey(e.to_string()))?;
        Self::new(&key)
    }

    /// Serialize `value` to JSON and seal it under a fresh random IV.
    pub fn encrypt<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CodecError> {
        let plaintext = serde_json::to_vec(value)?;
        let iv: [u8; IV_LEN] = rand::random();

        // aes-gcm appends the tag to the ciphertext.
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
            .map_err(|_| CodecError::Encryption)?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut envelope = Vec::with_capacity(IV_LEN + TAG_LEN + ciphertext.len());
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(tag);
        envelope.extend_from_slice(ciphertext);
        Ok(STANDARD.encode(envelope))
    }

    /// Open an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails with [`CodecError::Decryption`] when the tag does not verify.
    pub fn decrypt<T: DeserializeOwned>(&self, envelope: &str) -> Result<T, CodecError> {
        let raw = STANDARD
            .decode(envelope.trim())
            .map_err(|e| CodecError::InvalidEnvelope(e.to_string()))?;
        if raw.len() < IV_LEN + TAG_LEN {
            return Err(CodecError::InvalidEnvelope(format!(
                "expected at least {} bytes, got {}",
                IV_LEN + TAG_LEN,
                raw.len()
            )));
        }

        let (iv, rest) = raw.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(iv), sealed.as_slice())
            .map_err(|_| CodecError::Decryption)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
