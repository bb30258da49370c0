// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! AES-GCM Symmetric Cipher
//!
//! Symmetric primitive behind both the channel secret (wrapping data keys)
//! and the per-message data keys (encrypting fields).
//!
//! **Format**:
//! ```text
//! [ciphertext (len(plaintext)) | tag (16 bytes)]
//! ```
//!
//! - Key: 16, 24 or 32 bytes (AES-128/192/256)
//! - IV: 16 bytes (GCM with a 128-bit nonce)
//! - AAD: caller-supplied, may be empty
//!
//! Any length mismatch or tag failure is a `CipherError`; callers decide
//! whether that surfaces as `AuthFail` or `TamperDetected`.

use super::error::{CryptoError, Result};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, Payload};
use aes_gcm::aes::{Aes128, Aes192, Aes256};
use aes_gcm::AesGcm;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// IV length used everywhere in the channel.
pub const IV_LEN: usize = 16;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

type Aes128Gcm16 = AesGcm<Aes128, U16>;
type Aes192Gcm16 = AesGcm<Aes192, U16>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Supported symmetric key sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum KeyLength {
    /// 16-byte key
    #[default]
    Aes128,
    /// 24-byte key
    Aes192,
    /// 32-byte key
    Aes256,
}

impl KeyLength {
    /// All supported lengths, smallest first.
    pub const ALL: [KeyLength; 3] = [KeyLength::Aes128, KeyLength::Aes192, KeyLength::Aes256];

    /// Key size in bytes.
    pub fn bytes(&self) -> usize {
        match self {
            KeyLength::Aes128 => 16,
            KeyLength::Aes192 => 24,
            KeyLength::Aes256 => 32,
        }
    }
}

impl TryFrom<usize> for KeyLength {
    type Error = CryptoError;

    fn try_from(len: usize) -> Result<Self> {
        match len {
            16 => Ok(KeyLength::Aes128),
            24 => Ok(KeyLength::Aes192),
            32 => Ok(KeyLength::Aes256),
            other => Err(CryptoError::cipher(
                "key_length",
                format!("unsupported key length {} (expected 16, 24 or 32)", other),
            )),
        }
    }
}

impl From<KeyLength> for usize {
    fn from(len: KeyLength) -> usize {
        len.bytes()
    }
}

/// Cipher transformation used for payloads and key wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum CipherMode {
    /// AES in Galois/Counter Mode with a 16-byte IV
    #[default]
    #[serde(rename = "AES/GCM/NoPadding")]
    AesGcm,
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherMode::AesGcm => f.write_str("AES/GCM/NoPadding"),
        }
    }
}

impl FromStr for CipherMode {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AES/GCM/NOPADDING" | "AES-GCM" | "AES/GCM" => Ok(CipherMode::AesGcm),
            other => Err(CryptoError::AlgorithmUnavailable {
                algorithm: format!("cipher {}", other),
            }),
        }
    }
}

impl TryFrom<String> for CipherMode {
    type Error = CryptoError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

/// Encrypt `plaintext` under `key`/`iv`, returning `ciphertext || tag`.
///
/// # Example
///
/// ```
/// use shoulder_negotiate::crypto::aes_gcm::{decrypt, encrypt};
///
/// let key = [0x42u8; 16];
/// let iv = [0x01u8; 16];
/// let sealed = encrypt(&key, &iv, b"card=4111", b"field:card").unwrap();
/// let opened = decrypt(&key, &iv, &sealed, b"field:card").unwrap();
/// assert_eq!(&opened[..], b"card=4111");
/// ```
pub fn encrypt(key: &[u8], iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    check_iv(iv)?;
    match KeyLength::try_from(key.len())? {
        KeyLength::Aes128 => seal::<Aes128Gcm16>(key, iv, plaintext, aad),
        KeyLength::Aes192 => seal::<Aes192Gcm16>(key, iv, plaintext, aad),
        KeyLength::Aes256 => seal::<Aes256Gcm16>(key, iv, plaintext, aad),
    }
}

/// Decrypt `ciphertext || tag` under `key`/`iv`.
///
/// # Errors
///
/// `CipherError` on bad key/IV length, truncated input, or tag mismatch
/// (wrong key, wrong IV, wrong AAD, or modified ciphertext).
pub fn decrypt(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    check_iv(iv)?;
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::cipher(
            "decrypt",
            format!(
                "ciphertext too short: expected at least {} bytes, got {}",
                TAG_LEN,
                ciphertext.len()
            ),
        ));
    }
    let plaintext = match KeyLength::try_from(key.len())? {
        KeyLength::Aes128 => open::<Aes128Gcm16>(key, iv, ciphertext, aad)?,
        KeyLength::Aes192 => open::<Aes192Gcm16>(key, iv, ciphertext, aad)?,
        KeyLength::Aes256 => open::<Aes256Gcm16>(key, iv, ciphertext, aad)?,
    };
    Ok(Zeroizing::new(plaintext))
}

/// Fresh random IV.
pub fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Fresh random key of the given length.
pub fn random_key(length: KeyLength) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; length.bytes()]);
    OsRng.fill_bytes(&mut key);
    key
}

/// Mode-dispatching symmetric cipher, built from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymmetricCipher {
    mode: CipherMode,
}

impl SymmetricCipher {
    /// Cipher for `mode`.
    pub fn new(mode: CipherMode) -> Self {
        Self { mode }
    }

    /// Configured transformation.
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// See [`encrypt`].
    pub fn encrypt(&self, key: &[u8], iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        match self.mode {
            CipherMode::AesGcm => encrypt(key, iv, plaintext, aad),
        }
    }

    /// See [`decrypt`].
    pub fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        match self.mode {
            CipherMode::AesGcm => decrypt(key, iv, ciphertext, aad),
        }
    }
}

fn check_iv(iv: &[u8]) -> Result<()> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::cipher(
            "iv",
            format!("invalid IV size: expected {} bytes, got {}", IV_LEN, iv.len()),
        ));
    }
    Ok(())
}

fn seal<C>(key: &[u8], iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U16>,
{
    let cipher = C::new_from_slice(key)
        .map_err(|e| CryptoError::cipher("encrypt", format!("failed to create cipher: {}", e)))?;
    cipher
        .encrypt(
            GenericArray::from_slice(iv),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::cipher("encrypt", "AES-GCM encryption failed"))
}

fn open<C>(key: &[u8], iv: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U16>,
{
    let cipher = C::new_from_slice(key)
        .map_err(|e| CryptoError::cipher("decrypt", format!("failed to create cipher: {}", e)))?;
    cipher
        .decrypt(
            GenericArray::from_slice(iv),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::cipher("decrypt", "authentication tag mismatch"))
}
