// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Negotiation
//!
//! ECDH handshake between two peers that share nothing in advance. Runs
//! once per logical session; afterwards each peer holds a byte-identical
//! channel secret in its session store.
//!
//! ## Protocol Flow
//!
//! 1. Requester generates an ephemeral key pair and a session id
//! 2. Requester signs `(session_id, public_key)` and sends the request
//! 3. Responder verifies the token, generates its own key pair, derives
//!    the channel secret and stores it
//! 4. Responder signs `(session_id, its public_key)` and replies
//! 5. Requester verifies, derives the same channel secret and stores it

pub mod messages;
pub mod result;
pub mod session;

pub use messages::{NegotiationRequest, NegotiationResponse};
pub use result::NegotiationResult;
pub use session::{ChannelContext, NegotiationSession, NegotiationState};
