// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDSA Signatures
//!
//! Signs and verifies messages with the same ephemeral EC keys used for key
//! agreement. Handshake tokens are signatures of this kind: they prove the
//! sender holds the private half of the public key it is offering.
//!
//! Signatures are the fixed 64-byte `r || s` encoding; the message is hashed
//! with SHA-256 by the curve's ECDSA implementation.

use super::ecdh::{Curve, KeyPair, SecretMaterial};
use super::error::{CryptoError, Result};

/// Length of a fixed-size ECDSA signature (`r || s`).
pub const SIGNATURE_LEN: usize = 64;

/// Sign `message` with the private half of `key_pair`.
///
/// # Example
///
/// ```
/// use shoulder_negotiate::crypto::ecdh::{generate_key_pair, Curve};
/// use shoulder_negotiate::crypto::signature::{sign_message, verify_signature};
///
/// let pair = generate_key_pair(Curve::Secp256r1).unwrap();
/// let sig = sign_message(&pair, b"hello").unwrap();
/// assert!(verify_signature(Curve::Secp256r1, pair.public_key(), b"hello", &sig));
/// ```
pub fn sign_message(key_pair: &KeyPair, message: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    let mut out = [0u8; SIGNATURE_LEN];
    match key_pair.secret() {
        SecretMaterial::P256(sk) => {
            use p256::ecdsa::signature::Signer;
            let signing_key = p256::ecdsa::SigningKey::from_bytes(&sk.to_bytes())
                .map_err(|e| CryptoError::cipher("sign", format!("invalid signing key: {}", e)))?;
            let signature: p256::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| CryptoError::cipher("sign", e.to_string()))?;
            out.copy_from_slice(&signature.to_bytes());
        }
        SecretMaterial::K256(sk) => {
            use k256::ecdsa::signature::Signer;
            let signing_key = k256::ecdsa::SigningKey::from_bytes(&sk.to_bytes())
                .map_err(|e| CryptoError::cipher("sign", format!("invalid signing key: {}", e)))?;
            let signature: k256::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| CryptoError::cipher("sign", e.to_string()))?;
            out.copy_from_slice(&signature.to_bytes());
        }
    }
    Ok(out)
}

/// Verify `signature` over `message` against a SEC1 public key.
///
/// Never errors: malformed keys or signatures verify as `false`.
pub fn verify_signature(curve: Curve, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    if signature.len() != SIGNATURE_LEN {
        return false;
    }
    match curve {
        Curve::Secp256r1 => {
            use p256::ecdsa::signature::Verifier;
            let Ok(verifying_key) = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(signature) = p256::ecdsa::Signature::from_slice(signature) else {
                return false;
            };
            verifying_key.verify(message, &signature).is_ok()
        }
        Curve::Secp256k1 => {
            use k256::ecdsa::signature::Verifier;
            let Ok(verifying_key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(signature) = k256::ecdsa::Signature::from_slice(signature) else {
                return false;
            };
            verifying_key.verify(message, &signature).is_ok()
        }
    }
}
