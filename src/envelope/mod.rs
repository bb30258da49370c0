// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Envelope Encryption
//!
//! Per-message encryption on top of a negotiated session. Every message
//! gets a fresh random data key; selected fields are encrypted under it and
//! the data key itself is wrapped under the session's channel secret.
//!
//! **Field ciphertext**:
//! ```text
//! [msg_iv (16 bytes) | AES-GCM(data_key, msg_iv, field, aad) + tag]
//! aad = len32(session_id) || session_id || field_name
//! ```
//!
//! **Wrapped data key**:
//! ```text
//! [salt (16 bytes) | AES-GCM(shared_key, nonce, data_key, aad = session_id) + tag]
//! nonce = SHA-256(shared_iv || salt)[..16]
//! ```
//!
//! The channel key lives as long as the session, so the wrap nonce is
//! re-randomised per message through the salt; the channel IV stays the
//! base of every wrap nonce.
//!
//! ## Decryption order
//!
//! 1. Look up the session (`NoSuchSession` / `SessionExpired`)
//! 2. Verify the token over `(session_id, wrapped_data_key)` (`AuthFail`)
//! 3. Unwrap the data key (`AuthFail`)
//! 4. Decrypt each field (`TamperDetected`)
//!
//! Nothing is decrypted before the token verifies.

pub mod headers;

pub use headers::{HeaderTriple, DATA_KEY_HEADER, SESSION_HEADER, TOKEN_HEADER};

use crate::config::EnvelopeTokenScheme;
use crate::crypto::aes_gcm::{random_iv, random_key, SymmetricCipher, IV_LEN};
use crate::crypto::error::{CryptoError, Result};
use crate::crypto::session_keys::SharedResult;
use crate::crypto::token::{
    self, EcdsaTokenSigner, EcdsaTokenVerifier, HmacTokenKey, TokenVerifier,
};
use crate::negotiation::{ChannelContext, NegotiationResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};
use zeroize::Zeroizing;

/// Salt prefixed to every wrapped data key.
pub const WRAP_SALT_LEN: usize = 16;

/// Field name used by the single-payload [`EnvelopeCipher::encrypt`].
pub const BODY_FIELD: &str = "body";

/// Encrypted fields plus the headers that travel with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    pub fields: BTreeMap<String, Vec<u8>>,
    pub headers: HeaderTriple,
}

/// Encrypts outgoing and decrypts incoming messages for negotiated sessions.
#[derive(Debug, Clone)]
pub struct EnvelopeCipher {
    context: ChannelContext,
}

impl EnvelopeCipher {
    pub fn new(context: ChannelContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ChannelContext {
        &self.context
    }

    /// Encrypt `fields` for `session_id` under a fresh data key.
    ///
    /// # Errors
    ///
    /// `NoSuchSession` / `SessionExpired` when the session must be
    /// renegotiated first.
    pub async fn seal(
        &self,
        session_id: &str,
        fields: &BTreeMap<String, Vec<u8>>,
    ) -> Result<SealedEnvelope> {
        let session = self.context.store().fetch(session_id).await?;
        let cipher = self.context.cipher();
        let data_key = random_key(session.key_length());

        let mut sealed = BTreeMap::new();
        for (name, plaintext) in fields {
            let msg_iv = random_iv();
            let ciphertext = cipher.encrypt(
                &data_key,
                &msg_iv,
                plaintext,
                &field_aad(session_id, name),
            )?;

            let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
            out.extend_from_slice(&msg_iv);
            out.extend_from_slice(&ciphertext);
            sealed.insert(name.clone(), out);
        }

        let wrapped = wrap_data_key(cipher, &session, &data_key)?;
        let token = match self.context.config().envelope_token {
            EnvelopeTokenScheme::Ecdsa => token::issue(
                session_id,
                &wrapped,
                &EcdsaTokenSigner::new(session.self_key_pair()),
            )?,
            EnvelopeTokenScheme::Hmac => token::issue(
                session_id,
                &wrapped,
                &HmacTokenKey::from_channel_key(session.shared_key())?,
            )?,
        };

        debug!(session_id, fields = sealed.len(), "envelope sealed");
        Ok(SealedEnvelope {
            fields: sealed,
            headers: HeaderTriple::new(session_id.to_string(), wrapped, token.as_bytes().to_vec()),
        })
    }

    /// Verify `headers` and decrypt `fields`.
    ///
    /// # Errors
    ///
    /// - `NoSuchSession` / `SessionExpired`: renegotiate and retry
    /// - `AuthFail`: token or wrapped key did not authenticate
    /// - `TamperDetected`: a field ciphertext did not authenticate
    pub async fn open(
        &self,
        headers: &HeaderTriple,
        fields: &BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let session_id = headers.session_id();
        let session = self.context.store().fetch(session_id).await?;
        let data_key = self.verify_and_unwrap(&session, headers)?;

        let mut opened = BTreeMap::new();
        for (name, sealed) in fields {
            let mut plaintext =
                decrypt_field(self.context.cipher(), &data_key, session_id, name, sealed)?;
            opened.insert(name.clone(), std::mem::take(&mut *plaintext));
        }

        debug!(session_id, fields = opened.len(), "envelope opened");
        Ok(opened)
    }

    /// Single-payload form of [`EnvelopeCipher::seal`].
    pub async fn encrypt(&self, session_id: &str, plaintext: &[u8]) -> Result<(Vec<u8>, HeaderTriple)> {
        let mut fields = BTreeMap::new();
        fields.insert(BODY_FIELD.to_string(), plaintext.to_vec());

        let mut sealed = self.seal(session_id, &fields).await?;
        let ciphertext = sealed
            .fields
            .remove(BODY_FIELD)
            .ok_or_else(|| CryptoError::payload(BODY_FIELD, "missing sealed body"))?;
        Ok((ciphertext, sealed.headers))
    }

    /// Single-payload form of [`EnvelopeCipher::open`].
    pub async fn decrypt(&self, headers: &HeaderTriple, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut fields = BTreeMap::new();
        fields.insert(BODY_FIELD.to_string(), ciphertext.to_vec());

        let mut opened = self.open(headers, &fields).await?;
        opened
            .remove(BODY_FIELD)
            .ok_or_else(|| CryptoError::payload(BODY_FIELD, "missing opened body"))
    }

    /// Verify the token and recover the data key carried by `headers`.
    pub async fn unwrap_data_key(&self, headers: &HeaderTriple) -> Result<Zeroizing<Vec<u8>>> {
        let session = self.context.store().fetch(headers.session_id()).await?;
        self.verify_and_unwrap(&session, headers)
    }

    fn verify_and_unwrap(
        &self,
        session: &NegotiationResult,
        headers: &HeaderTriple,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let session_id = headers.session_id();
        let policy = self.context.config().token_policy();

        let verified = match self.context.config().envelope_token {
            EnvelopeTokenScheme::Ecdsa => {
                let verifier =
                    EcdsaTokenVerifier::new(session.curve(), session.other_public_key());
                verify_token(headers, &verifier, &policy)
            }
            EnvelopeTokenScheme::Hmac => {
                let key = HmacTokenKey::from_channel_key(session.shared_key())?;
                verify_token(headers, &key, &policy)
            }
        };
        if !verified {
            warn!(session_id, "🚫 Envelope token rejected");
            return Err(CryptoError::AuthFail {
                operation: "verify_token".to_string(),
                session_id: session_id.to_string(),
            });
        }

        let cipher = self.context.cipher();
        unwrap_data_key(cipher, session, headers.wrapped_data_key()).map_err(|_| {
            warn!(session_id, "🚫 Wrapped data key failed to authenticate");
            CryptoError::AuthFail {
                operation: "unwrap_data_key".to_string(),
                session_id: session_id.to_string(),
            }
        })
    }
}

fn verify_token(
    headers: &HeaderTriple,
    verifier: &dyn TokenVerifier,
    policy: &token::TokenPolicy,
) -> bool {
    token::verify(
        headers.session_id(),
        headers.wrapped_data_key(),
        headers.token(),
        verifier,
        policy,
    )
}

fn field_aad(session_id: &str, field: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(4 + session_id.len() + field.len());
    aad.extend_from_slice(&(session_id.len() as u32).to_be_bytes());
    aad.extend_from_slice(session_id.as_bytes());
    aad.extend_from_slice(field.as_bytes());
    aad
}

fn wrap_nonce(shared_iv: &[u8], salt: &[u8]) -> [u8; IV_LEN] {
    let digest = Sha256::new().chain_update(shared_iv).chain_update(salt).finalize();
    let mut nonce = [0u8; IV_LEN];
    nonce.copy_from_slice(&digest[..IV_LEN]);
    nonce
}

fn wrap_data_key(
    cipher: &SymmetricCipher,
    session: &SharedResult,
    data_key: &[u8],
) -> Result<Vec<u8>> {
    let salt = random_iv();
    let nonce = wrap_nonce(session.shared_iv(), &salt);
    let ciphertext = cipher.encrypt(
        session.shared_key(),
        &nonce,
        data_key,
        session.session_id().as_bytes(),
    )?;

    let mut wrapped = Vec::with_capacity(WRAP_SALT_LEN + ciphertext.len());
    wrapped.extend_from_slice(&salt);
    wrapped.extend_from_slice(&ciphertext);
    Ok(wrapped)
}

fn unwrap_data_key(
    cipher: &SymmetricCipher,
    session: &NegotiationResult,
    wrapped: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if wrapped.len() <= WRAP_SALT_LEN {
        return Err(CryptoError::cipher("unwrap_data_key", "wrapped key too short"));
    }
    let (salt, ciphertext) = wrapped.split_at(WRAP_SALT_LEN);
    let nonce = wrap_nonce(session.shared_iv(), salt);
    let data_key = cipher.decrypt(
        session.shared_key(),
        &nonce,
        ciphertext,
        session.session_id().as_bytes(),
    )?;

    if data_key.len() != session.key_length().bytes() {
        return Err(CryptoError::cipher(
            "unwrap_data_key",
            format!(
                "data key has {} bytes, session uses {}",
                data_key.len(),
                session.key_length().bytes()
            ),
        ));
    }
    Ok(data_key)
}

fn decrypt_field(
    cipher: &SymmetricCipher,
    data_key: &[u8],
    session_id: &str,
    field: &str,
    sealed: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let tamper = || {
        error!(session_id, field, "🚨 Tamper detected: field failed authentication");
        CryptoError::TamperDetected {
            session_id: session_id.to_string(),
            field: field.to_string(),
        }
    };

    if sealed.len() < IV_LEN {
        return Err(tamper());
    }
    let (msg_iv, ciphertext) = sealed.split_at(IV_LEN);
    cipher
        .decrypt(data_key, msg_iv, ciphertext, &field_aad(session_id, field))
        .map_err(|_| tamper())
}
