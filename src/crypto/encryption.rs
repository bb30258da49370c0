// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! XChaCha20-Poly1305 Encryption/Decryption
//!
//! Content cipher for the asymmetric (ECIES) channel variant. The 24-byte
//! nonce is large enough to be drawn at random for every message.

use super::error::{CryptoError, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// XChaCha20 nonce size.
pub const XNONCE_LEN: usize = 24;

/// Encrypt data using XChaCha20-Poly1305 AEAD
///
/// # Arguments
///
/// * `plaintext` - Data to encrypt
/// * `nonce` - 24-byte nonce (must be unique for this key)
/// * `aad` - Additional authenticated data (can be empty)
/// * `key` - 32-byte encryption key
///
/// # Returns
///
/// Encrypted ciphertext with the 16-byte authentication tag appended
pub fn encrypt_with_aead(plaintext: &[u8], nonce: &[u8], aad: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let cipher = build_cipher(nonce, key, "xchacha_encrypt")?;

    cipher
        .encrypt(XNonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::cipher("xchacha_encrypt", format!("encryption failed: {}", e)))
}

/// Decrypt data using XChaCha20-Poly1305 AEAD
///
/// # Errors
///
/// Returns `CipherError` if:
/// - Authentication tag verification fails (tampered data)
/// - Nonce size is not 24 bytes
/// - Key size is not 32 bytes
pub fn decrypt_with_aead(
    ciphertext: &[u8],
    nonce: &[u8],
    aad: &[u8],
    key: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = build_cipher(nonce, key, "xchacha_decrypt")?;

    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|e| {
            CryptoError::cipher(
                "xchacha_decrypt",
                format!("decryption failed (authentication error): {}", e),
            )
        })?;

    Ok(Zeroizing::new(plaintext))
}

/// Random 24-byte nonce.
pub fn random_xnonce() -> [u8; XNONCE_LEN] {
    let mut nonce = [0u8; XNONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn build_cipher(nonce: &[u8], key: &[u8], operation: &str) -> Result<XChaCha20Poly1305> {
    if nonce.len() != XNONCE_LEN {
        return Err(CryptoError::cipher(
            operation,
            format!(
                "invalid nonce size: expected {} bytes, got {}",
                XNONCE_LEN,
                nonce.len()
            ),
        ));
    }
    if key.len() != 32 {
        return Err(CryptoError::cipher(
            operation,
            format!("invalid key size: expected 32 bytes, got {}", key.len()),
        ));
    }
    XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::cipher(operation, format!("failed to create cipher: {}", e)))
}
