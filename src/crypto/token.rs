// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Negotiation Tokens
//!
//! A token proves that whoever produced a handshake message or an envelope
//! holds a key bound to the session, and that the key material it carries
//! was not substituted in transit.
//!
//! **Token format**:
//! ```text
//! [version (1 byte) | issued_at (8 bytes, big-endian unix seconds) | tag]
//! ```
//!
//! The tag authenticates:
//! ```text
//! "shoulder-negotiate/token/v1"
//!   || len32(session_id) || session_id
//!   || len32(key_material) || key_material
//!   || issued_at
//! ```
//!
//! Two tag schemes exist, behind [`TokenSigner`] / [`TokenVerifier`]:
//!
//! - **ECDSA** with the sender's ephemeral key (64-byte tag). Handshake
//!   tokens always use this since no shared secret exists yet.
//! - **HMAC-SHA256** under a key derived from the channel secret
//!   (32-byte tag). Selectable for envelope tokens.
//!
//! Verification returns `bool` and never errors. Malformed, expired,
//! future-dated and mismatched tokens all verify `false`.

use super::ecdh::{Curve, KeyPair};
use super::error::{CryptoError, Result};
use super::kdf::hkdf_sha256;
use super::signature::{sign_message, verify_signature};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Current token format version.
pub const TOKEN_VERSION: u8 = 1;

/// Bytes before the tag: version plus timestamp.
pub const TOKEN_HEADER_LEN: usize = 9;

const TOKEN_DOMAIN: &[u8] = b"shoulder-negotiate/token/v1";
const ENVELOPE_TOKEN_INFO: &[u8] = b"shoulder-negotiate/envelope-token";

type HmacSha256 = Hmac<Sha256>;

/// Produces the tag over a token message.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Checks a tag over a token message.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, message: &[u8], tag: &[u8]) -> bool;
}

/// ECDSA signer backed by an ephemeral key pair.
pub struct EcdsaTokenSigner<'a> {
    key_pair: &'a KeyPair,
}

impl<'a> EcdsaTokenSigner<'a> {
    pub fn new(key_pair: &'a KeyPair) -> Self {
        Self { key_pair }
    }
}

impl TokenSigner for EcdsaTokenSigner<'_> {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(sign_message(self.key_pair, message)?.to_vec())
    }
}

/// ECDSA verifier for a peer's public key.
pub struct EcdsaTokenVerifier<'a> {
    curve: Curve,
    public_key: &'a [u8],
}

impl<'a> EcdsaTokenVerifier<'a> {
    pub fn new(curve: Curve, public_key: &'a [u8]) -> Self {
        Self { curve, public_key }
    }
}

impl TokenVerifier for EcdsaTokenVerifier<'_> {
    fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        verify_signature(self.curve, self.public_key, message, tag)
    }
}

/// Symmetric token key, derived from the channel key so both peers hold it.
#[derive(Clone)]
pub struct HmacTokenKey {
    key: Zeroizing<Vec<u8>>,
}

impl HmacTokenKey {
    /// Derive the envelope token key from a negotiated channel key.
    pub fn from_channel_key(channel_key: &[u8]) -> Result<Self> {
        Ok(Self {
            key: hkdf_sha256(channel_key, None, ENVELOPE_TOKEN_INFO, 32)?,
        })
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| CryptoError::cipher("hmac_token", e.to_string()))
    }
}

impl fmt::Debug for HmacTokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacTokenKey(<redacted>)")
    }
}

impl TokenSigner for HmacTokenKey {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl TokenVerifier for HmacTokenKey {
    fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(message);
        // constant-time comparison
        mac.verify_slice(tag).is_ok()
    }
}

/// Freshness window applied during verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Oldest token accepted
    pub max_age: Duration,
    /// How far in the future `issued_at` may be
    pub max_skew: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(300),
            max_skew: Duration::from_secs(30),
        }
    }
}

/// An issued token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    bytes: Vec<u8>,
}

impl Token {
    /// Wrap raw token bytes. No validation happens until [`verify`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decode a base64 token.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::payload("token", format!("invalid base64: {}", e)))?;
        Ok(Self { bytes })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Issue time, if the token is well-formed enough to carry one.
    pub fn issued_at(&self) -> Option<u64> {
        parse(&self.bytes).map(|(issued_at, _)| issued_at)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("issued_at", &self.issued_at())
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Issue a token over `(session_id, key_material)` timestamped now.
pub fn issue(session_id: &str, key_material: &[u8], signer: &dyn TokenSigner) -> Result<Token> {
    issue_at(session_id, key_material, signer, unix_now())
}

/// Issue a token with an explicit timestamp.
pub fn issue_at(
    session_id: &str,
    key_material: &[u8],
    signer: &dyn TokenSigner,
    issued_at: u64,
) -> Result<Token> {
    let message = token_message(session_id, key_material, issued_at);
    let tag = signer.sign(&message)?;

    let mut bytes = Vec::with_capacity(TOKEN_HEADER_LEN + tag.len());
    bytes.push(TOKEN_VERSION);
    bytes.extend_from_slice(&issued_at.to_be_bytes());
    bytes.extend_from_slice(&tag);
    Ok(Token { bytes })
}

/// `true` iff `token` authenticates `(session_id, key_material)` under
/// `verifier` and is inside the freshness window.
pub fn verify(
    session_id: &str,
    key_material: &[u8],
    token: &[u8],
    verifier: &dyn TokenVerifier,
    policy: &TokenPolicy,
) -> bool {
    verify_at(session_id, key_material, token, verifier, policy, unix_now())
}

/// [`verify`] against an explicit clock.
pub fn verify_at(
    session_id: &str,
    key_material: &[u8],
    token: &[u8],
    verifier: &dyn TokenVerifier,
    policy: &TokenPolicy,
    now: u64,
) -> bool {
    let Some((issued_at, tag)) = parse(token) else {
        return false;
    };

    if now.saturating_sub(issued_at) > policy.max_age.as_secs() {
        tracing::debug!(session_id, issued_at, now, "token too old");
        return false;
    }
    if issued_at > now.saturating_add(policy.max_skew.as_secs()) {
        tracing::debug!(session_id, issued_at, now, "token issued in the future");
        return false;
    }

    let message = token_message(session_id, key_material, issued_at);
    verifier.verify(&message, tag)
}

fn parse(token: &[u8]) -> Option<(u64, &[u8])> {
    if token.len() <= TOKEN_HEADER_LEN || token[0] != TOKEN_VERSION {
        return None;
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&token[1..TOKEN_HEADER_LEN]);
    Some((u64::from_be_bytes(ts), &token[TOKEN_HEADER_LEN..]))
}

fn token_message(session_id: &str, key_material: &[u8], issued_at: u64) -> Vec<u8> {
    let mut message =
        Vec::with_capacity(TOKEN_DOMAIN.len() + 16 + session_id.len() + key_material.len());
    message.extend_from_slice(TOKEN_DOMAIN);
    message.extend_from_slice(&(session_id.len() as u32).to_be_bytes());
    message.extend_from_slice(session_id.as_bytes());
    message.extend_from_slice(&(key_material.len() as u32).to_be_bytes());
    message.extend_from_slice(key_material);
    message.extend_from_slice(&issued_at.to_be_bytes());
    message
}

pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
