// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Asymmetric Cipher
//!
//! Public-key encryption and signatures over the channel's EC keys.
//!
//! Encryption is ECIES: the sender generates an ephemeral key pair on the
//! recipient's curve, runs ECDH, derives a content key with HKDF-SHA256 and
//! seals with XChaCha20-Poly1305.
//!
//! **Sealed format**:
//! ```text
//! [ephemeral_pub (65 bytes) | nonce (24 bytes) | ciphertext + tag]
//! ```
//!
//! The ephemeral public key is bound into the AEAD as associated data, so a
//! substituted key fails authentication instead of decrypting to garbage.

use super::ecdh::{compute_shared_secret, generate_key_pair, Curve, KeyPair, PUBLIC_KEY_LEN};
use super::encryption::{decrypt_with_aead, encrypt_with_aead, random_xnonce, XNONCE_LEN};
use super::error::{CryptoError, Result};
use super::kdf::hkdf_sha256;
use super::signature::{sign_message, verify_signature};
use zeroize::Zeroizing;

const ECIES_INFO: &[u8] = b"shoulder-negotiate/ecies";

/// Minimum sealed size: header plus an empty message's tag.
const MIN_SEALED_LEN: usize = PUBLIC_KEY_LEN + XNONCE_LEN + 16;

/// Encrypt `plaintext` to the holder of `recipient_public_key`.
pub fn encrypt(curve: Curve, recipient_public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let ephemeral = generate_key_pair(curve)?;
    let shared = compute_shared_secret(&ephemeral, recipient_public_key)?;
    let key = hkdf_sha256(&shared, None, ECIES_INFO, 32)?;

    let nonce = random_xnonce();
    let ciphertext = encrypt_with_aead(plaintext, &nonce, ephemeral.public_key(), &key)?;

    let mut sealed = Vec::with_capacity(PUBLIC_KEY_LEN + XNONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(ephemeral.public_key());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a message sealed to `key_pair`.
///
/// # Errors
///
/// - `CipherError` if the input is truncated or fails authentication
/// - `NegotiationError` if the embedded ephemeral key is not on our curve
pub fn decrypt(key_pair: &KeyPair, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(CryptoError::cipher(
            "ecies_decrypt",
            format!(
                "sealed message too short: expected at least {} bytes, got {}",
                MIN_SEALED_LEN,
                sealed.len()
            ),
        ));
    }

    let (ephemeral_pub, rest) = sealed.split_at(PUBLIC_KEY_LEN);
    let (nonce, ciphertext) = rest.split_at(XNONCE_LEN);

    let shared = compute_shared_secret(key_pair, ephemeral_pub)?;
    let key = hkdf_sha256(&shared, None, ECIES_INFO, 32)?;
    decrypt_with_aead(ciphertext, nonce, ephemeral_pub, &key)
}

/// Asymmetric operations bound to a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AsymmetricCipher {
    curve: Curve,
}

impl AsymmetricCipher {
    /// Cipher for keys on `curve`.
    pub fn new(curve: Curve) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// See [`encrypt`].
    pub fn encrypt(&self, recipient_public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt(self.curve, recipient_public_key, plaintext)
    }

    /// See [`decrypt`]. The key pair must be on this cipher's curve.
    pub fn decrypt(&self, key_pair: &KeyPair, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.check_curve(key_pair)?;
        decrypt(key_pair, sealed)
    }

    /// ECDSA signature over `message`.
    pub fn sign(&self, key_pair: &KeyPair, message: &[u8]) -> Result<Vec<u8>> {
        self.check_curve(key_pair)?;
        Ok(sign_message(key_pair, message)?.to_vec())
    }

    /// `true` iff `signature` is valid for `message` under `public_key`.
    pub fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        verify_signature(self.curve, public_key, message, signature)
    }

    fn check_curve(&self, key_pair: &KeyPair) -> Result<()> {
        if key_pair.curve() != self.curve {
            return Err(CryptoError::negotiation(format!(
                "key pair is on {}, cipher expects {}",
                key_pair.curve(),
                self.curve
            )));
        }
        Ok(())
    }
}
