// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// AES-256-GCM credential cipher.
//
// Provider API keys are stored as hex(nonce || ciphertext), sealed with the
// process-wide secret from PROVIDER_SECRET_KEY (hex-encoded 32 bytes).

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("secret key must be hex-encoded 32 bytes (AES-256)")]
    InvalidKey,

    #[error("ciphertext is not valid hex or too short")]
    InvalidCiphertext,

    #[error("encryption/decryption failed")]
    CipherFailure,
}

const NONCE_LEN: usize = 12;

fn key_bytes(secret_hex: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = hex::decode(secret_hex).map_err(|_| CryptoError::InvalidKey)?;
    bytes.try_into().map_err(|_| CryptoError::InvalidKey)
}

/// Seal plaintext, returning hex(nonce || ciphertext).
pub fn encrypt(plaintext: &[u8], secret_hex: &str) -> Result<String, CryptoError> {
    let key = key_bytes(secret_hex)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::CipherFailure)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(hex::encode(sealed))
}

/// Open hex(nonce || ciphertext) back into plaintext bytes.
pub fn decrypt(cipher_hex: &str, secret_hex: &str) -> Result<Vec<u8>, CryptoError> {
    let key = key_bytes(secret_hex)?;
    let data = hex::decode(cipher_hex).map_err(|_| CryptoError::InvalidCiphertext)?;
    if data.len() < NONCE_LEN {
        return Err(CryptoError::InvalidCiphertext);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
    cipher
        .decrypt(nonce, &data[NONCE_LEN..])
        .map_err(|_| CryptoError::CipherFailure)
}
