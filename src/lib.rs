// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Negotiated envelope encryption for peers talking over plain HTTP.
//!
//! Two peers run an ECDH handshake once per logical session
//! ([`negotiation`]), then protect individual message fields with fresh
//! per-message data keys wrapped under the negotiated channel secret
//! ([`envelope`]).
pub mod cli;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod negotiation;
pub mod utils;

pub use config::{ChannelConfig, EnvelopeTokenScheme};
pub use crypto::{CryptoError, FailureAction, MemorySessionStore, SessionStore};
pub use envelope::{EnvelopeCipher, HeaderTriple, SealedEnvelope};
pub use negotiation::{
    ChannelContext, NegotiationRequest, NegotiationResponse, NegotiationResult,
    NegotiationSession, NegotiationState,
};
