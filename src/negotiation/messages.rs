// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handshake Wire Messages
//!
//! The two messages exchanged during negotiation. Both are immutable once
//! built and serialize as camelCase JSON with binary fields in standard
//! base64, e.g.:
//!
//! ```json
//! {
//!   "sessionId": "2f1c...",
//!   "publicKey": "BO3x...",
//!   "token": "AQAAAABm...",
//!   "refresh": false
//! }
//! ```

use crate::crypto::error::Result;
use serde::{Deserialize, Serialize};

/// Requester → responder: offer an ephemeral public key for `session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationRequest {
    session_id: String,
    #[serde(with = "crate::utils::base64_bytes")]
    public_key: Vec<u8>,
    #[serde(with = "crate::utils::base64_bytes")]
    token: Vec<u8>,
    #[serde(default)]
    refresh: bool,
    /// Refresh of a live session: tag under the current channel key
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "crate::utils::base64_bytes"
    )]
    proof: Vec<u8>,
}

impl NegotiationRequest {
    pub fn new(session_id: String, public_key: Vec<u8>, token: Vec<u8>, refresh: bool) -> Self {
        Self {
            session_id,
            public_key,
            token,
            refresh,
            proof: Vec::new(),
        }
    }

    /// Attach the proof that the sender holds the session being refreshed.
    pub fn with_proof(mut self, proof: Vec<u8>) -> Self {
        self.proof = proof;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Requester's ephemeral public key (SEC1 uncompressed)
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn token(&self) -> &[u8] {
        &self.token
    }

    /// Whether this request replaces an existing (usually expired) session
    pub fn refresh(&self) -> bool {
        self.refresh
    }

    /// Token over this request under the session's current channel key.
    /// Required when refreshing a session that is still live.
    pub fn proof(&self) -> Option<&[u8]> {
        if self.proof.is_empty() {
            None
        } else {
            Some(&self.proof)
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Responder → requester: the responder's ephemeral public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    session_id: String,
    #[serde(with = "crate::utils::base64_bytes")]
    public_key: Vec<u8>,
    #[serde(with = "crate::utils::base64_bytes")]
    token: Vec<u8>,
}

impl NegotiationResponse {
    pub fn new(session_id: String, public_key: Vec<u8>, token: Vec<u8>) -> Self {
        Self {
            session_id,
            public_key,
            token,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Responder's ephemeral public key (SEC1 uncompressed)
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn token(&self) -> &[u8] {
        &self.token
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
