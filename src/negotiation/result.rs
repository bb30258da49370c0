// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Negotiation Result
//!
//! What each peer computes on its own at the end of a handshake. Never
//! transmitted; the two peers' `shared_key` and `shared_iv` are
//! byte-identical because both derive them from the same ECDH secret.

use crate::crypto::aes_gcm::{KeyLength, IV_LEN};
use crate::crypto::ecdh::{compute_shared_secret, Curve, KeyPair};
use crate::crypto::error::{CryptoError, Result};
use crate::crypto::kdf::{ChannelSecret, SharedSecretDeriver};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Outcome of a completed handshake on one side.
pub struct NegotiationResult {
    session_id: String,
    self_key_pair: KeyPair,
    other_public_key: Vec<u8>,
    secret: ChannelSecret,
    key_length: KeyLength,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl NegotiationResult {
    /// Run key agreement and derivation for one side of a handshake.
    ///
    /// `self_key_pair` is consumed: the result owns it for the session's
    /// lifetime so outgoing envelope tokens can be signed with it. The
    /// `deriver` must be for the key pair's curve.
    pub fn establish(
        session_id: &str,
        self_key_pair: KeyPair,
        other_public_key: &[u8],
        deriver: &SharedSecretDeriver,
        key_length: KeyLength,
        ttl: Duration,
    ) -> Result<Self> {
        if deriver.curve() != self_key_pair.curve() {
            return Err(CryptoError::negotiation(format!(
                "deriver is for {}, key pair is on {}",
                deriver.curve(),
                self_key_pair.curve()
            )));
        }
        let raw = compute_shared_secret(&self_key_pair, other_public_key)?;
        let secret = deriver.derive(&raw, key_length)?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| CryptoError::InvalidConfig("session ttl out of range".to_string()))?;
        let created_at = Utc::now();

        Ok(Self {
            session_id: session_id.to_string(),
            self_key_pair,
            other_public_key: other_public_key.to_vec(),
            secret,
            key_length,
            created_at,
            expires_at: created_at + ttl,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn curve(&self) -> Curve {
        self.self_key_pair.curve()
    }

    /// Our ephemeral key pair for this session
    pub fn self_key_pair(&self) -> &KeyPair {
        &self.self_key_pair
    }

    /// Peer's ephemeral public key
    pub fn other_public_key(&self) -> &[u8] {
        &self.other_public_key
    }

    /// Channel key (`key_length` bytes)
    pub fn shared_key(&self) -> &[u8] {
        &self.secret.key
    }

    /// Channel IV
    pub fn shared_iv(&self) -> &[u8; IV_LEN] {
        &self.secret.iv
    }

    pub fn key_length(&self) -> KeyLength {
        self.key_length
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for NegotiationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationResult")
            .field("session_id", &self.session_id)
            .field("curve", &self.curve())
            .field("key_length", &self.key_length.bytes())
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
