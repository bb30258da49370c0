// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared Secret Derivation
//!
//! Turns the raw ECDH output into the channel secret (key + IV). Both peers
//! run this independently, so it must be a pure function of its inputs:
//!
//! ```text
//! digest = H(raw_secret)
//! key    = digest[..key_length]
//! iv     = digest[digest.len() - 16..]
//! ```
//!
//! Also hosts the HKDF helper used for sub-keys (envelope HMAC tokens and
//! the asymmetric cipher's content key).

use super::aes_gcm::{KeyLength, IV_LEN};
use super::ecdh::Curve;
use super::error::{CryptoError, Result};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Hash used to condense the raw ECDH secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum HashAlgorithm {
    /// SHA-256 (32-byte digest)
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    /// SHA-512 (64-byte digest)
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }

    fn digest(&self, data: &[u8]) -> Zeroizing<Vec<u8>> {
        match self {
            HashAlgorithm::Sha256 => Zeroizing::new(Sha256::digest(data).to_vec()),
            HashAlgorithm::Sha512 => Zeroizing::new(Sha512::digest(data).to_vec()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => f.write_str("SHA-256"),
            HashAlgorithm::Sha512 => f.write_str("SHA-512"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            other => Err(CryptoError::AlgorithmUnavailable {
                algorithm: format!("hash {}", other),
            }),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = CryptoError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

/// Channel secret: symmetric key plus IV, zeroed on drop.
#[derive(Clone)]
pub struct ChannelSecret {
    /// Symmetric key, `key_length` bytes
    pub key: Zeroizing<Vec<u8>>,
    /// IV, always 16 bytes
    pub iv: Zeroizing<[u8; IV_LEN]>,
}

impl fmt::Debug for ChannelSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSecret")
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

/// Derives the channel secret from a raw ECDH secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedSecretDeriver {
    curve: Curve,
    hash: HashAlgorithm,
}

impl SharedSecretDeriver {
    /// Deriver for secrets produced on `curve`, condensed with `hash`.
    pub fn new(curve: Curve, hash: HashAlgorithm) -> Self {
        Self { curve, hash }
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    /// Derive `(key[key_length], iv[16])` from `raw_secret`.
    ///
    /// # Errors
    ///
    /// `IllegalSecretLength` when `raw_secret` is not the curve's fixed
    /// ECDH output size.
    ///
    /// # Example
    ///
    /// ```
    /// use shoulder_negotiate::crypto::aes_gcm::KeyLength;
    /// use shoulder_negotiate::crypto::ecdh::Curve;
    /// use shoulder_negotiate::crypto::kdf::{HashAlgorithm, SharedSecretDeriver};
    ///
    /// let deriver = SharedSecretDeriver::new(Curve::Secp256r1, HashAlgorithm::Sha256);
    /// let secret = deriver.derive(&[7u8; 32], KeyLength::Aes128).unwrap();
    /// assert_eq!(secret.key.len(), 16);
    /// assert_eq!(secret.iv.len(), 16);
    /// ```
    pub fn derive(&self, raw_secret: &[u8], key_length: KeyLength) -> Result<ChannelSecret> {
        let expected = self.curve.shared_secret_len();
        if raw_secret.len() != expected {
            return Err(CryptoError::IllegalSecretLength {
                expected,
                actual: raw_secret.len(),
            });
        }

        let digest = self.hash.digest(raw_secret);
        let key_len = key_length.bytes();

        let mut iv = Zeroizing::new([0u8; IV_LEN]);
        iv.copy_from_slice(&digest[digest.len() - IV_LEN..]);

        Ok(ChannelSecret {
            key: Zeroizing::new(digest[..key_len].to_vec()),
            iv,
        })
    }
}

/// HKDF-SHA256 expand of `ikm` under `info` to `output_len` bytes.
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::cipher("hkdf_expand", e.to_string()))?;
    Ok(okm)
}
