// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cryptographic Primitives
//!
//! Everything below the handshake and envelope layers:
//!
//! - **ECDH**: Ephemeral key agreement on secp256r1 (default) or secp256k1
//! - **KDF**: Channel key + IV derivation from the raw ECDH secret, plus HKDF
//! - **AES-GCM**: Symmetric cipher for data keys and field payloads
//! - **Asymmetric**: ECIES (XChaCha20-Poly1305) and ECDSA signatures
//! - **Token**: Authenticity tokens over `(session_id, key material)`
//! - **Session Keys**: Async session store with per-entry expiry
//!
//! ## Security Considerations
//!
//! - Private keys, channel secrets and data keys are zeroed on drop
//! - None of them are ever logged; logs carry session ids and lengths only
//! - Every IV/nonce under a long-lived key is unique per encryption
//! - Tokens are verified before any decryption is attempted

pub mod aes_gcm;
pub mod asymmetric;
pub mod ecdh;
pub mod encryption;
pub mod error;
pub mod kdf;
pub mod session_keys;
pub mod signature;
pub mod token;

pub use aes_gcm::{CipherMode, KeyLength, SymmetricCipher};
pub use asymmetric::AsymmetricCipher;
pub use ecdh::{compute_shared_secret, generate_key_pair, Curve, KeyPair};
pub use error::{CryptoError, FailureAction, Result};
pub use kdf::{ChannelSecret, HashAlgorithm, SharedSecretDeriver};
pub use session_keys::{spawn_purge_task, MemorySessionStore, SessionStore, SharedResult};
pub use token::{
    EcdsaTokenSigner, EcdsaTokenVerifier, HmacTokenKey, Token, TokenPolicy, TokenSigner,
    TokenVerifier,
};
