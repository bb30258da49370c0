// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! One error type for every failure the channel can surface, with enough
//! context to log the failure without leaking key material.
//!
//! ## Error Variants
//!
//! - **AlgorithmUnavailable**: curve, hash or cipher not supported (fatal config error)
//! - **AuthFail**: token or key-wrap authentication failed (reject, no retry)
//! - **NoSuchSession** / **SessionExpired**: caller must re-handshake
//! - **TamperDetected**: payload tag failure after the token was accepted
//! - **IllegalSecretLength**: raw ECDH secret has the wrong length
//! - **CipherError**: symmetric/asymmetric primitive misuse or failure
//! - **NegotiationError**: malformed key, mismatched session, conflicting handshake
//! - **InvalidState**: handshake operation called in the wrong state
//! - **InvalidPayload**: header or wire field could not be decoded
//! - **InvalidConfig**: configuration rejected at startup
//!
//! Token verification is the one place that does not use this type: it
//! returns `bool` so the hot path rejects forgeries without building errors.
//!
//! ## Usage Example
//!
//! ```rust
//! use shoulder_negotiate::crypto::{CryptoError, FailureAction};
//!
//! let err = CryptoError::SessionExpired {
//!     session_id: "s1".to_string(),
//! };
//! assert_eq!(err.action(), FailureAction::Renegotiate);
//! ```

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Comprehensive error type for all channel operations
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// Requested curve, hash, cipher or key length is not supported
    #[error("Algorithm unavailable: {algorithm}")]
    AlgorithmUnavailable {
        /// Name of the algorithm that was requested
        algorithm: String,
    },

    /// Token verification (or key unwrap) failed
    ///
    /// Terminal for the message or handshake that produced it.
    #[error("Authentication failed during {operation} (session {session_id})")]
    AuthFail {
        /// Which operation was being performed
        operation: String,
        /// Session the failure belongs to
        session_id: String,
    },

    /// No negotiated session exists for this id
    #[error("No negotiated session for session_id: {session_id}")]
    NoSuchSession {
        /// Session ID that was not found
        session_id: String,
    },

    /// The negotiated session exists but its TTL has elapsed
    #[error("Negotiated session expired: {session_id}")]
    SessionExpired {
        /// Session ID that expired
        session_id: String,
    },

    /// Payload failed authenticated decryption after the token was accepted
    #[error("Tamper detected in {field} (session {session_id})")]
    TamperDetected {
        /// Session the payload belongs to
        session_id: String,
        /// Field whose ciphertext failed to authenticate
        field: String,
    },

    /// Raw ECDH secret does not match the curve's fixed output size
    #[error("Illegal shared secret length: expected {expected} bytes, got {actual} bytes")]
    IllegalSecretLength {
        /// Expected size for the configured curve
        expected: usize,
        /// Actual size provided
        actual: usize,
    },

    /// Cipher primitive failure (bad key/IV length, tag mismatch, ...)
    #[error("Cipher error during {operation}: {reason}")]
    CipherError {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Handshake could not be completed with the supplied material
    #[error("Negotiation failed: {reason}")]
    NegotiationError {
        /// Specific failure reason
        reason: String,
    },

    /// Operation not permitted in the current handshake state
    #[error("Invalid negotiation state: expected {expected}, was {actual}")]
    InvalidState {
        /// State the operation requires
        expected: String,
        /// State the session was in
        actual: String,
    },

    /// Wire or header field could not be decoded
    #[error("Invalid payload field '{field}': {reason}")]
    InvalidPayload {
        /// Which field failed validation
        field: String,
        /// Specific failure reason
        reason: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// What the transport collaborator should do with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Run a fresh handshake (with `refresh = true` on the same id) and retry once
    Renegotiate,
    /// Hard rejection, no retry hint
    Reject,
    /// Programmer or configuration error; surface immediately
    Fatal,
}

impl CryptoError {
    /// Classify the error for the transport collaborator.
    pub fn action(&self) -> FailureAction {
        match self {
            CryptoError::NoSuchSession { .. } | CryptoError::SessionExpired { .. } => {
                FailureAction::Renegotiate
            }
            CryptoError::AuthFail { .. }
            | CryptoError::TamperDetected { .. }
            | CryptoError::NegotiationError { .. }
            | CryptoError::InvalidState { .. }
            | CryptoError::InvalidPayload { .. } => FailureAction::Reject,
            CryptoError::AlgorithmUnavailable { .. }
            | CryptoError::IllegalSecretLength { .. }
            | CryptoError::CipherError { .. }
            | CryptoError::InvalidConfig(_) => FailureAction::Fatal,
        }
    }

    /// Shorthand for the renegotiate signal.
    pub fn requires_renegotiation(&self) -> bool {
        self.action() == FailureAction::Renegotiate
    }

    pub(crate) fn cipher(operation: &str, reason: impl Into<String>) -> Self {
        CryptoError::CipherError {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn negotiation(reason: impl Into<String>) -> Self {
        CryptoError::NegotiationError {
            reason: reason.into(),
        }
    }

    pub(crate) fn payload(field: &str, reason: impl Into<String>) -> Self {
        CryptoError::InvalidPayload {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// Conversion from base64 decode errors
impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::InvalidPayload {
            field: "base64_field".to_string(),
            reason: format!("base64 decode error: {}", err),
        }
    }
}

// Conversion from hex decode errors
impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::InvalidPayload {
            field: "hex_field".to_string(),
            reason: format!("hex decode error: {}", err),
        }
    }
}

// Conversion from JSON (wire message) errors
impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::InvalidPayload {
            field: "json".to_string(),
            reason: err.to_string(),
        }
    }
}
