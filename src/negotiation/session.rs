// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handshake State Machine
//!
//! ```text
//! Init ──request──▶ Requested ──complete──▶ Established ──ttl──▶ Expired
//!  │ │                                          │                  │
//!  │ └──refresh(id)──▶ Refreshing               └──request()──▶ Refreshing ──complete──▶ Established
//!  └──respond──▶ Responded
//! ```
//!
//! A requester calls [`NegotiationSession::request`], sends the request,
//! and feeds the response to [`NegotiationSession::complete`]. A responder
//! calls [`NegotiationSession::respond`] on a fresh session. Each side
//! stores its own [`NegotiationResult`] in the shared [`SessionStore`].
//!
//! ## Refresh
//!
//! A refresh replaces the responder's entry for an existing id. While that
//! entry is still live the request must carry a proof: a token over the
//! request under the current channel key. Only the peer holding the
//! session can produce it, and a proof for one request does not cover a
//! different public key. A refresh that re-offers the public key the live
//! entry was negotiated with is a replay and is refused.
//!
//! Failures are terminal for the attempt and never retried internally.

use super::messages::{NegotiationRequest, NegotiationResponse};
use super::result::NegotiationResult;
use crate::config::ChannelConfig;
use crate::crypto::aes_gcm::SymmetricCipher;
use crate::crypto::ecdh::{generate_key_pair, KeyPair};
use crate::crypto::error::{CryptoError, Result};
use crate::crypto::kdf::SharedSecretDeriver;
use crate::crypto::session_keys::{
    spawn_purge_task, MemorySessionStore, SessionStore, SharedResult,
};
use crate::crypto::token::{self, EcdsaTokenSigner, EcdsaTokenVerifier, HmacTokenKey};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Validated configuration plus the session store, shared by every
/// handshake and envelope operation.
#[derive(Clone)]
pub struct ChannelContext {
    config: Arc<ChannelConfig>,
    store: Arc<dyn SessionStore>,
    deriver: SharedSecretDeriver,
    cipher: SymmetricCipher,
}

impl ChannelContext {
    /// Validate `config` and bind it to `store`.
    pub fn new(config: ChannelConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            deriver: config.deriver(),
            cipher: SymmetricCipher::new(config.cipher),
            config: Arc::new(config),
            store,
        })
    }

    /// Context backed by a fresh [`MemorySessionStore`].
    pub fn in_memory(config: ChannelConfig) -> Result<Self> {
        Self::new(config, Arc::new(MemorySessionStore::new()))
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Channel-secret derivation for the configured curve and hash.
    pub fn deriver(&self) -> &SharedSecretDeriver {
        &self.deriver
    }

    /// Payload cipher for the configured mode.
    pub fn cipher(&self) -> &SymmetricCipher {
        &self.cipher
    }

    /// Start evicting expired sessions from the store every `interval`.
    pub fn spawn_purge_task(&self, interval: Duration) -> JoinHandle<()> {
        spawn_purge_task(Arc::clone(&self.store), interval)
    }
}

impl fmt::Debug for ChannelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Observable handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    /// Nothing sent or received yet
    Init,
    /// Request sent, waiting for the response
    Requested,
    /// Responder side: response emitted, result stored
    Responded,
    /// Requester side: result stored and live
    Established,
    /// Result's TTL has elapsed
    Expired,
    /// Refresh request sent for an existing session id
    Refreshing,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

enum State {
    Init,
    Requested {
        session_id: String,
        key_pair: KeyPair,
        refresh: bool,
    },
    Responded {
        result: SharedResult,
    },
    Established {
        result: SharedResult,
    },
}

impl State {
    fn observable(&self) -> NegotiationState {
        match self {
            State::Init => NegotiationState::Init,
            State::Requested { refresh: false, .. } => NegotiationState::Requested,
            State::Requested { refresh: true, .. } => NegotiationState::Refreshing,
            State::Responded { result } if result.is_expired() => NegotiationState::Expired,
            State::Responded { .. } => NegotiationState::Responded,
            State::Established { result } if result.is_expired() => NegotiationState::Expired,
            State::Established { .. } => NegotiationState::Established,
        }
    }
}

/// One side of one handshake.
pub struct NegotiationSession {
    context: ChannelContext,
    state: State,
}

impl NegotiationSession {
    pub fn new(context: ChannelContext) -> Self {
        Self {
            context,
            state: State::Init,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state.observable()
    }

    /// Session id once one is known.
    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            State::Init => None,
            State::Requested { session_id, .. } => Some(session_id.as_str()),
            State::Responded { result } | State::Established { result } => {
                Some(result.session_id())
            }
        }
    }

    /// Stored result once the handshake has finished on this side.
    pub fn result(&self) -> Option<SharedResult> {
        match &self.state {
            State::Responded { result } | State::Established { result } => {
                Some(Arc::clone(result))
            }
            _ => None,
        }
    }

    /// Start a handshake as the requester.
    ///
    /// - From `Init` with `None`: allocates a new session id.
    /// - From `Init` with `Some(id)`: opens a new session under `id`. The
    ///   responder refuses it while `id` holds a live session.
    /// - From `Established`/`Expired`: refreshes our own session (the id,
    ///   if given, must be ours).
    pub fn request(&mut self, session_id: Option<&str>) -> Result<NegotiationRequest> {
        let (session_id, previous) = match (&self.state, session_id) {
            (State::Init, None) => (Uuid::new_v4().to_string(), None),
            (State::Init, Some(id)) => (id.to_string(), None),
            (State::Established { result }, None) => {
                (result.session_id().to_string(), Some(Arc::clone(result)))
            }
            (State::Established { result }, Some(id)) if id == result.session_id() => {
                (id.to_string(), Some(Arc::clone(result)))
            }
            (other, _) => {
                return Err(CryptoError::InvalidState {
                    expected: "Init, Established or Expired".to_string(),
                    actual: other.observable().to_string(),
                })
            }
        };

        let refresh = previous.is_some();
        self.start(session_id, refresh, previous)
    }

    /// Refresh `session_id` from a fresh session, e.g. after a restart.
    ///
    /// If our store still holds the live result for `session_id`, the
    /// request carries the proof the responder needs to replace it.
    pub async fn refresh(&mut self, session_id: &str) -> Result<NegotiationRequest> {
        let previous = match &self.state {
            State::Init => self.context.store.get(session_id).await,
            State::Established { result } if result.session_id() == session_id => {
                Some(Arc::clone(result))
            }
            other => {
                return Err(CryptoError::InvalidState {
                    expected: "Init, Established or Expired".to_string(),
                    actual: other.observable().to_string(),
                })
            }
        };

        self.start(session_id.to_string(), true, previous)
    }

    fn start(
        &mut self,
        session_id: String,
        refresh: bool,
        previous: Option<SharedResult>,
    ) -> Result<NegotiationRequest> {
        if session_id.is_empty() {
            return Err(CryptoError::negotiation("session id must not be empty"));
        }

        let key_pair = generate_key_pair(self.context.config.curve)?;
        let material = request_material(key_pair.public_key(), refresh);
        let token = token::issue(&session_id, &material, &EcdsaTokenSigner::new(&key_pair))?;

        let mut request = NegotiationRequest::new(
            session_id.clone(),
            key_pair.public_key().to_vec(),
            token.as_bytes().to_vec(),
            refresh,
        );
        if let Some(previous) = &previous {
            let key = HmacTokenKey::from_channel_key(previous.shared_key())?;
            let proof = token::issue(&session_id, &material, &key)?;
            request = request.with_proof(proof.as_bytes().to_vec());
        }

        info!(
            session_id = %session_id,
            refresh,
            proven = previous.is_some(),
            curve = %self.context.config.curve,
            "🤝 Negotiation requested"
        );
        self.state = State::Requested {
            session_id,
            key_pair,
            refresh,
        };
        Ok(request)
    }

    /// Answer a request as the responder and store the result.
    ///
    /// # Errors
    ///
    /// - `AuthFail` if the request's token does not verify, or it refreshes
    ///   a live session without a valid proof (nothing stored)
    /// - `NegotiationError` if the public key is unusable, the id already
    ///   holds a live session and the request is not a refresh, or a
    ///   refresh replays the live session's public key
    pub async fn respond(&mut self, request: &NegotiationRequest) -> Result<NegotiationResponse> {
        if !matches!(self.state, State::Init) {
            return Err(CryptoError::InvalidState {
                expected: "Init".to_string(),
                actual: self.state().to_string(),
            });
        }

        let config = &self.context.config;
        let session_id = request.session_id();
        if session_id.is_empty() {
            return Err(CryptoError::negotiation("session id must not be empty"));
        }

        let material = request_material(request.public_key(), request.refresh());
        let verifier = EcdsaTokenVerifier::new(config.curve, request.public_key());
        if !token::verify(
            session_id,
            &material,
            request.token(),
            &verifier,
            &config.token_policy(),
        ) {
            warn!(session_id = %session_id, "🚫 Negotiation request token rejected");
            return Err(CryptoError::AuthFail {
                operation: "respond".to_string(),
                session_id: session_id.to_string(),
            });
        }

        if request.refresh() {
            if let Some(current) = self.context.store.get(session_id).await {
                authorize_refresh(&current, request, &material, config)?;
            }
        }

        let key_pair = generate_key_pair(config.curve)?;
        let token = token::issue(
            session_id,
            key_pair.public_key(),
            &EcdsaTokenSigner::new(&key_pair),
        )?;
        let response = NegotiationResponse::new(
            session_id.to_string(),
            key_pair.public_key().to_vec(),
            token.as_bytes().to_vec(),
        );

        let result = Arc::new(NegotiationResult::establish(
            session_id,
            key_pair,
            request.public_key(),
            &self.context.deriver,
            config.key_length,
            config.session_ttl(),
        )?);

        if request.refresh() {
            self.context.store.replace(Arc::clone(&result)).await;
        } else {
            self.context.store.put_if_absent(Arc::clone(&result)).await?;
        }

        info!(
            session_id = %session_id,
            refresh = request.refresh(),
            key_length = config.key_length.bytes(),
            "🤝 Negotiation response issued"
        );
        self.state = State::Responded { result };
        Ok(response)
    }

    /// Finish the handshake as the requester and store the result.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless a request is outstanding
    /// - `NegotiationError` if the response is for another session id
    /// - `AuthFail` if the response token does not verify; the session
    ///   returns to `Init`
    pub async fn complete(&mut self, response: &NegotiationResponse) -> Result<SharedResult> {
        let (session_id, key_pair, refresh) =
            match std::mem::replace(&mut self.state, State::Init) {
                State::Requested {
                    session_id,
                    key_pair,
                    refresh,
                } => (session_id, key_pair, refresh),
                old_state => {
                    let actual = old_state.observable().to_string();
                    self.state = old_state;
                    return Err(CryptoError::InvalidState {
                        expected: "Requested or Refreshing".to_string(),
                        actual,
                    });
                }
            };

        if response.session_id() != session_id {
            let err = CryptoError::negotiation(format!(
                "response is for session {}, expected {}",
                response.session_id(),
                session_id
            ));
            self.state = State::Requested {
                session_id,
                key_pair,
                refresh,
            };
            return Err(err);
        }

        let config = &self.context.config;
        let verifier = EcdsaTokenVerifier::new(config.curve, response.public_key());
        if !token::verify(
            &session_id,
            response.public_key(),
            response.token(),
            &verifier,
            &config.token_policy(),
        ) {
            warn!(session_id = %session_id, "🚫 Negotiation response token rejected");
            return Err(CryptoError::AuthFail {
                operation: "complete".to_string(),
                session_id,
            });
        }

        let result = Arc::new(NegotiationResult::establish(
            &session_id,
            key_pair,
            response.public_key(),
            &self.context.deriver,
            config.key_length,
            config.session_ttl(),
        )?);
        self.context.store.put(Arc::clone(&result)).await;

        debug!(session_id = %session_id, refresh, "negotiated result stored");
        info!(session_id = %session_id, "✅ Negotiation established");
        self.state = State::Established {
            result: Arc::clone(&result),
        };
        Ok(result)
    }
}

impl fmt::Debug for NegotiationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationSession")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .finish()
    }
}

/// A refresh of a live session must prove it comes from the session's peer.
fn authorize_refresh(
    current: &NegotiationResult,
    request: &NegotiationRequest,
    material: &[u8],
    config: &ChannelConfig,
) -> Result<()> {
    let session_id = request.session_id();

    if request.public_key() == current.other_public_key() {
        warn!(session_id = %session_id, "🚫 Refresh replays the live session's key");
        return Err(CryptoError::negotiation(format!(
            "refresh of session {} reuses its current public key",
            session_id
        )));
    }

    let key = HmacTokenKey::from_channel_key(current.shared_key())?;
    let proven = request.proof().is_some_and(|proof| {
        token::verify(session_id, material, proof, &key, &config.token_policy())
    });
    if !proven {
        warn!(session_id = %session_id, "🚫 Refresh of live session without valid proof");
        return Err(CryptoError::AuthFail {
            operation: "refresh".to_string(),
            session_id: session_id.to_string(),
        });
    }
    Ok(())
}

/// Key material a request token covers: the public key plus the refresh
/// flag, so a captured request cannot be replayed as a refresh.
fn request_material(public_key: &[u8], refresh: bool) -> Vec<u8> {
    let mut material = Vec::with_capacity(public_key.len() + 1);
    material.extend_from_slice(public_key);
    material.push(refresh as u8);
    material
}
