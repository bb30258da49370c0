// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDH Key Agreement
//!
//! Ephemeral key-pair generation and Elliptic Curve Diffie-Hellman over the
//! 256-bit curves the channel supports:
//!
//! - `secp256r1` (NIST P-256), the default
//! - `secp256k1`
//!
//! Public keys travel in SEC1 uncompressed form (`0x04 || x || y`, 65 bytes).
//! The shared secret is the x-coordinate of the ECDH point (32 bytes).
//!
//! Everything here is stateless; a `KeyPair` is owned by exactly one
//! handshake attempt and its secret scalar is zeroed when dropped.

use super::error::{CryptoError, Result};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Size of an uncompressed SEC1 public key for the supported curves.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Elliptic curves available for key agreement.
///
/// Deserializes through [`FromStr`], so every accepted spelling is accepted
/// in config files too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Curve {
    /// NIST P-256
    #[default]
    #[serde(rename = "secp256r1")]
    Secp256r1,
    /// The Koblitz curve used by Bitcoin and Ethereum
    #[serde(rename = "secp256k1")]
    Secp256k1,
}

impl Curve {
    /// Canonical curve name.
    pub fn name(&self) -> &'static str {
        match self {
            Curve::Secp256r1 => "secp256r1",
            Curve::Secp256k1 => "secp256k1",
        }
    }

    /// Curve size in bits.
    pub fn bits(&self) -> usize {
        256
    }

    /// Fixed length of the raw ECDH output.
    pub fn shared_secret_len(&self) -> usize {
        32
    }

    /// Length of an encoded public key.
    pub fn public_key_len(&self) -> usize {
        PUBLIC_KEY_LEN
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Curve {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "secp256r1" | "p256" | "p-256" | "prime256v1" => Ok(Curve::Secp256r1),
            "secp256k1" | "k256" => Ok(Curve::Secp256k1),
            other => Err(CryptoError::AlgorithmUnavailable {
                algorithm: format!("curve {}", other),
            }),
        }
    }
}

impl TryFrom<String> for Curve {
    type Error = CryptoError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

/// Curve-specific secret scalar.
pub(crate) enum SecretMaterial {
    P256(p256::SecretKey),
    K256(k256::SecretKey),
}

/// Ephemeral EC key pair.
///
/// The secret half never leaves this struct: it is not serializable, not
/// printed by `Debug`, and zeroed on drop.
pub struct KeyPair {
    curve: Curve,
    secret: SecretMaterial,
    public_key: Vec<u8>,
}

impl KeyPair {
    /// Restore a key pair from a 32-byte big-endian private scalar.
    ///
    /// Useful for test vectors. Fails with `NegotiationError` when the
    /// scalar is zero or not below the curve order.
    pub fn from_private(curve: Curve, private_key: &[u8]) -> Result<Self> {
        if private_key.len() != 32 {
            return Err(CryptoError::negotiation(format!(
                "{} private key must be 32 bytes, got {}",
                curve,
                private_key.len()
            )));
        }

        let secret = match curve {
            Curve::Secp256r1 => SecretMaterial::P256(
                p256::SecretKey::from_slice(private_key)
                    .map_err(|_| CryptoError::negotiation("invalid secp256r1 private key"))?,
            ),
            Curve::Secp256k1 => SecretMaterial::K256(
                k256::SecretKey::from_slice(private_key)
                    .map_err(|_| CryptoError::negotiation("invalid secp256k1 private key"))?,
            ),
        };

        Ok(Self::from_secret(curve, secret))
    }

    fn from_secret(curve: Curve, secret: SecretMaterial) -> Self {
        let public_key = match &secret {
            SecretMaterial::P256(sk) => sk.public_key().to_encoded_point(false).as_bytes().to_vec(),
            SecretMaterial::K256(sk) => sk.public_key().to_encoded_point(false).as_bytes().to_vec(),
        };
        Self {
            curve,
            secret,
            public_key,
        }
    }

    /// Curve this key pair lives on.
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Algorithm family name.
    pub fn algorithm(&self) -> &'static str {
        "EC"
    }

    /// Public key, SEC1 uncompressed.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Private scalar as big-endian bytes.
    pub fn private_key_bytes(&self) -> Zeroizing<Vec<u8>> {
        match &self.secret {
            SecretMaterial::P256(sk) => Zeroizing::new(sk.to_bytes().to_vec()),
            SecretMaterial::K256(sk) => Zeroizing::new(sk.to_bytes().to_vec()),
        }
    }

    pub(crate) fn secret(&self) -> &SecretMaterial {
        &self.secret
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("curve", &self.curve)
            .field("public_key", &hex::encode(&self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Generate a fresh ephemeral key pair on `curve`.
///
/// # Example
///
/// ```
/// use shoulder_negotiate::crypto::ecdh::{generate_key_pair, Curve};
///
/// let pair = generate_key_pair(Curve::default()).unwrap();
/// assert_eq!(pair.public_key().len(), 65);
/// assert_eq!(pair.public_key()[0], 0x04);
/// ```
pub fn generate_key_pair(curve: Curve) -> Result<KeyPair> {
    let secret = match curve {
        Curve::Secp256r1 => SecretMaterial::P256(p256::SecretKey::random(&mut OsRng)),
        Curve::Secp256k1 => SecretMaterial::K256(k256::SecretKey::random(&mut OsRng)),
    };
    Ok(KeyPair::from_secret(curve, secret))
}

/// Generate a key pair for a curve given by name.
///
/// Unknown names fail with `AlgorithmUnavailable`.
pub fn generate_key_pair_named(curve: &str) -> Result<KeyPair> {
    generate_key_pair(curve.parse()?)
}

/// Check that `public_key` is a well-formed uncompressed point on `curve`.
pub fn validate_public_key(curve: Curve, public_key: &[u8]) -> Result<()> {
    if public_key.len() != curve.public_key_len() {
        return Err(CryptoError::negotiation(format!(
            "{} public key must be {} bytes (uncompressed), got {}",
            curve,
            curve.public_key_len(),
            public_key.len()
        )));
    }
    if public_key[0] != 0x04 {
        return Err(CryptoError::negotiation(
            "public key must use uncompressed SEC1 format (0x04 prefix)",
        ));
    }

    let on_curve = match curve {
        Curve::Secp256r1 => p256::PublicKey::from_sec1_bytes(public_key).is_ok(),
        Curve::Secp256k1 => k256::PublicKey::from_sec1_bytes(public_key).is_ok(),
    };
    if !on_curve {
        return Err(CryptoError::negotiation(format!(
            "public key is not a valid {} point",
            curve
        )));
    }
    Ok(())
}

/// Compute the raw ECDH shared secret between our key pair and a peer's
/// public key.
///
/// # Errors
///
/// `NegotiationError` when the peer key has the wrong length, is compressed,
/// or is not a point on our curve.
pub fn compute_shared_secret(
    self_key_pair: &KeyPair,
    other_public_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    validate_public_key(self_key_pair.curve, other_public_key)?;

    let shared = match &self_key_pair.secret {
        SecretMaterial::P256(sk) => {
            let peer = p256::PublicKey::from_sec1_bytes(other_public_key)
                .map_err(|_| CryptoError::negotiation("invalid secp256r1 public key"))?;
            let secret = p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), peer.as_affine());
            secret.raw_secret_bytes().to_vec()
        }
        SecretMaterial::K256(sk) => {
            let peer = k256::PublicKey::from_sec1_bytes(other_public_key)
                .map_err(|_| CryptoError::negotiation("invalid secp256k1 public key"))?;
            let secret = k256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), peer.as_affine());
            secret.raw_secret_bytes().to_vec()
        }
    };

    Ok(Zeroizing::new(shared))
}
