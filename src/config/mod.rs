// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Channel Configuration
//!
//! Explicit, validated configuration for the negotiated channel. Built once
//! at startup from defaults, environment variables or a TOML file, then
//! shared read-only (`Arc<ChannelConfig>`) by the handshake and envelope
//! layers.

use crate::crypto::aes_gcm::{CipherMode, KeyLength};
use crate::crypto::ecdh::Curve;
use crate::crypto::error::{CryptoError, Result};
use crate::crypto::kdf::{HashAlgorithm, SharedSecretDeriver};
use crate::crypto::token::TokenPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on a session's lifetime.
const MAX_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Tag scheme for envelope tokens. Handshake tokens are always ECDSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum EnvelopeTokenScheme {
    /// Signature with the sender's ephemeral key
    #[default]
    Ecdsa,
    /// HMAC-SHA256 keyed from the channel secret
    Hmac,
}

impl fmt::Display for EnvelopeTokenScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeTokenScheme::Ecdsa => f.write_str("ecdsa"),
            EnvelopeTokenScheme::Hmac => f.write_str("hmac"),
        }
    }
}

impl FromStr for EnvelopeTokenScheme {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ecdsa" => Ok(EnvelopeTokenScheme::Ecdsa),
            "hmac" | "hmac-sha256" => Ok(EnvelopeTokenScheme::Hmac),
            other => Err(CryptoError::AlgorithmUnavailable {
                algorithm: format!("token scheme {}", other),
            }),
        }
    }
}

impl TryFrom<String> for EnvelopeTokenScheme {
    type Error = CryptoError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

/// Channel Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Curve for ephemeral key agreement
    pub curve: Curve,

    /// Digest used to derive the channel key and IV
    pub hash: HashAlgorithm,

    /// Symmetric transformation
    pub cipher: CipherMode,

    /// Channel and data key size in bytes (16, 24 or 32)
    pub key_length: KeyLength,

    /// Lifetime of a negotiated session
    pub session_ttl_secs: u64,

    /// Oldest token accepted
    pub token_max_age_secs: u64,

    /// Allowed clock skew for tokens issued "in the future"
    pub token_max_skew_secs: u64,

    /// Tag scheme for envelope tokens
    pub envelope_token: EnvelopeTokenScheme,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            curve: Curve::Secp256r1,
            hash: HashAlgorithm::Sha256,
            cipher: CipherMode::AesGcm,
            key_length: KeyLength::Aes128,
            session_ttl_secs: 3600,  // 1 hour
            token_max_age_secs: 300, // 5 minutes
            token_max_skew_secs: 30,
            envelope_token: EnvelopeTokenScheme::Ecdsa,
        }
    }
}

impl ChannelConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables (all optional, defaults as in `Default`):
    /// - `NEGOTIATE_CURVE`: secp256r1 | secp256k1
    /// - `NEGOTIATE_HASH`: SHA-256 | SHA-512
    /// - `NEGOTIATE_CIPHER`: AES/GCM/NoPadding
    /// - `NEGOTIATE_KEY_LENGTH`: 16 | 24 | 32
    /// - `NEGOTIATE_SESSION_TTL_SECS`: session lifetime
    /// - `NEGOTIATE_TOKEN_MAX_AGE_SECS`: token freshness window
    /// - `NEGOTIATE_TOKEN_MAX_SKEW_SECS`: tolerated future skew
    /// - `NEGOTIATE_ENVELOPE_TOKEN`: ecdsa | hmac
    ///
    /// Unknown algorithm names fail with `AlgorithmUnavailable`; malformed
    /// numbers fail with `InvalidConfig`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            curve: env_parse("NEGOTIATE_CURVE")?.unwrap_or(defaults.curve),
            hash: env_parse("NEGOTIATE_HASH")?.unwrap_or(defaults.hash),
            cipher: env_parse("NEGOTIATE_CIPHER")?.unwrap_or(defaults.cipher),
            key_length: match env_number("NEGOTIATE_KEY_LENGTH")? {
                Some(len) => KeyLength::try_from(len as usize).map_err(|_| {
                    CryptoError::AlgorithmUnavailable {
                        algorithm: format!("AES key length {}", len),
                    }
                })?,
                None => defaults.key_length,
            },
            session_ttl_secs: env_number("NEGOTIATE_SESSION_TTL_SECS")?
                .unwrap_or(defaults.session_ttl_secs),
            token_max_age_secs: env_number("NEGOTIATE_TOKEN_MAX_AGE_SECS")?
                .unwrap_or(defaults.token_max_age_secs),
            token_max_skew_secs: env_number("NEGOTIATE_TOKEN_MAX_SKEW_SECS")?
                .unwrap_or(defaults.token_max_skew_secs),
            envelope_token: env_parse("NEGOTIATE_ENVELOPE_TOKEN")?
                .unwrap_or(defaults.envelope_token),
        })
    }

    /// Load configuration from the `[negotiate]` section of a TOML file.
    ///
    /// A missing section yields the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CryptoError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text (see [`ChannelConfig::from_file`]).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_value: toml::Value = toml::from_str(content)
            .map_err(|e| CryptoError::InvalidConfig(format!("invalid TOML: {}", e)))?;

        let Some(section) = toml_value.get("negotiate") else {
            return Ok(Self::default());
        };

        // Report unknown algorithms as such rather than as a serde error
        if let Some(name) = section.get("curve").and_then(|v| v.as_str()) {
            name.parse::<Curve>()?;
        }
        if let Some(name) = section.get("hash").and_then(|v| v.as_str()) {
            name.parse::<HashAlgorithm>()?;
        }
        if let Some(name) = section.get("cipher").and_then(|v| v.as_str()) {
            name.parse::<CipherMode>()?;
        }
        if let Some(name) = section.get("envelope_token").and_then(|v| v.as_str()) {
            name.parse::<EnvelopeTokenScheme>()?;
        }

        section
            .clone()
            .try_into()
            .map_err(|e| CryptoError::InvalidConfig(format!("invalid [negotiate] section: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_secs == 0 {
            return Err(CryptoError::InvalidConfig(
                "session_ttl_secs must be > 0".to_string(),
            ));
        }

        if self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(CryptoError::InvalidConfig(format!(
                "session_ttl_secs too large (max {})",
                MAX_SESSION_TTL_SECS
            )));
        }

        if self.token_max_age_secs == 0 {
            return Err(CryptoError::InvalidConfig(
                "token_max_age_secs must be > 0".to_string(),
            ));
        }

        if self.token_max_skew_secs > self.token_max_age_secs {
            return Err(CryptoError::InvalidConfig(
                "token_max_skew_secs must not exceed token_max_age_secs".to_string(),
            ));
        }

        if self.key_length.bytes() > self.hash.output_len() {
            return Err(CryptoError::InvalidConfig(format!(
                "{} cannot supply a {}-byte key",
                self.hash,
                self.key_length.bytes()
            )));
        }

        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Freshness window for token verification.
    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            max_age: Duration::from_secs(self.token_max_age_secs),
            max_skew: Duration::from_secs(self.token_max_skew_secs),
        }
    }

    pub fn deriver(&self) -> SharedSecretDeriver {
        SharedSecretDeriver::new(self.curve, self.hash)
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr<Err = CryptoError>,
{
    match env::var(name) {
        Ok(value) => value.parse().map(Some),
        Err(_) => Ok(None),
    }
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| {
            CryptoError::InvalidConfig(format!("{} must be a non-negative integer", name))
        }),
        Err(_) => Ok(None),
    }
}
