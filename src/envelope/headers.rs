// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Envelope Header Triple
//!
//! The three values that travel beside every encrypted call. Header names
//! match case-insensitively when parsing; binary values are standard base64.

use crate::crypto::error::{CryptoError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;

/// Session id header, carried verbatim
pub const SESSION_HEADER: &str = "X-Negotiate-Session";
/// Wrapped data key header, base64
pub const DATA_KEY_HEADER: &str = "X-Negotiate-Data-Key";
/// Envelope token header, base64
pub const TOKEN_HEADER: &str = "X-Negotiate-Token";

/// `{session_id, wrapped_data_key, token}` for one message.
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderTriple {
    session_id: String,
    wrapped_data_key: Vec<u8>,
    token: Vec<u8>,
}

impl HeaderTriple {
    pub fn new(session_id: String, wrapped_data_key: Vec<u8>, token: Vec<u8>) -> Self {
        Self {
            session_id,
            wrapped_data_key,
            token,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn wrapped_data_key(&self) -> &[u8] {
        &self.wrapped_data_key
    }

    pub fn token(&self) -> &[u8] {
        &self.token
    }

    /// Header name/value pairs ready to attach to an outgoing call.
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (SESSION_HEADER, self.session_id.clone()),
            (DATA_KEY_HEADER, STANDARD.encode(&self.wrapped_data_key)),
            (TOKEN_HEADER, STANDARD.encode(&self.token)),
        ]
    }

    /// Parse the triple from an incoming call's headers.
    ///
    /// Unrelated headers are ignored. A missing, empty or undecodable value
    /// fails with `InvalidPayload`.
    pub fn from_headers<I, K, V>(headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut session_id = None;
        let mut wrapped_data_key = None;
        let mut token = None;

        for (name, value) in headers {
            let name = name.as_ref();
            let value = value.as_ref().trim();
            if name.eq_ignore_ascii_case(SESSION_HEADER) {
                session_id = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(DATA_KEY_HEADER) {
                wrapped_data_key = Some(decode(DATA_KEY_HEADER, value)?);
            } else if name.eq_ignore_ascii_case(TOKEN_HEADER) {
                token = Some(decode(TOKEN_HEADER, value)?);
            }
        }

        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| missing(SESSION_HEADER))?;
        let wrapped_data_key = wrapped_data_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| missing(DATA_KEY_HEADER))?;
        let token = token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| missing(TOKEN_HEADER))?;

        Ok(Self {
            session_id,
            wrapped_data_key,
            token,
        })
    }
}

impl fmt::Debug for HeaderTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderTriple")
            .field("session_id", &self.session_id)
            .field("wrapped_data_key_len", &self.wrapped_data_key.len())
            .field("token_len", &self.token.len())
            .finish()
    }
}

fn decode(header: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::payload(header, format!("invalid base64: {}", e)))
}

fn missing(header: &str) -> CryptoError {
    CryptoError::payload(header, "header missing or empty")
}
