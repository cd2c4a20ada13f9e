//! Nonce helpers for identity providers that bind a login request to a
//! one-time value: the raw nonce goes to the client, its SHA-256 digest to
//! the provider.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Characters a nonce is drawn from.
pub const NONCE_CHARSET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVXYZabcdefghijklmnopqrstuvwxyz-._";

pub const DEFAULT_NONCE_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum NonceError {
    #[error("nonce length must be greater than zero")]
    ZeroLength,
    #[error("system randomness unavailable: {0}")]
    Random(#[from] getrandom::Error),
}

/// Random nonce of `length` characters from [`NONCE_CHARSET`].
///
/// Random bytes outside the charset range are rejected rather than reduced
/// modulo the charset size, so every character is equally likely.
pub fn generate_nonce(length: usize) -> Result<String, NonceError> {
    if length == 0 {
        return Err(NonceError::ZeroLength);
    }

    let mut nonce = String::with_capacity(length);
    let mut batch = [0u8; 16];
    while nonce.len() < length {
        getrandom::fill(&mut batch)?;
        for &byte in &batch {
            if nonce.len() == length {
                break;
            }
            if let Some(&ch) = NONCE_CHARSET.get(byte as usize) {
                nonce.push(ch as char);
            }
        }
    }

    Ok(nonce)
}

/// Lowercase hex SHA-256 of `input`.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
