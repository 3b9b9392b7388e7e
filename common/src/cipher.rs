//! AES-256-GCM helpers for group payloads
//!
//! Ciphertexts carry their 12-byte nonce as a prefix.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use thiserror::Error;

pub const NONCE_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("cipher key must be 32 bytes, got {0}")]
    BadKeyLength(usize),

    #[error("ciphertext too short: {0} bytes")]
    Truncated(usize),

    #[error("authentication failed")]
    Authentication,
}

/// Encrypt `plaintext` under `key`, prefixing the nonce
pub fn aes_encrypt(
    key: &[u8],
    nonce: [u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::BadKeyLength(key.len()))?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CipherError::Authentication)?;
    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Reverse of [`aes_encrypt`]
pub fn aes_decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::BadKeyLength(key.len()))?;
    if ciphertext.len() < NONCE_LEN {
        return Err(CipherError::Truncated(ciphertext.len()));
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
    cipher.decrypt(Nonce::from_slice(nonce), sealed).map_err(|_| CipherError::Authentication)
}
