// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Isolation Tests
//!
//! Fresh key agreements never collide, and one session's envelopes do not
//! open under another's.

use shoulder_negotiate::crypto::aes_gcm::KeyLength;
use shoulder_negotiate::crypto::ecdh::{compute_shared_secret, generate_key_pair, Curve};
use shoulder_negotiate::crypto::kdf::{HashAlgorithm, SharedSecretDeriver};
use shoulder_negotiate::{
    ChannelConfig, ChannelContext, CryptoError, EnvelopeCipher, HeaderTriple, NegotiationSession,
    SessionStore,
};
use std::collections::HashSet;

#[test]
fn test_thousand_agreements_yield_distinct_keys() {
    let deriver = SharedSecretDeriver::new(Curve::Secp256r1, HashAlgorithm::Sha256);
    let mut seen = HashSet::new();

    for _ in 0..1000 {
        let a = generate_key_pair(Curve::Secp256r1).unwrap();
        let b = generate_key_pair(Curve::Secp256r1).unwrap();
        let raw = compute_shared_secret(&a, b.public_key()).unwrap();
        let secret = deriver.derive(&raw, KeyLength::Aes128).unwrap();
        assert!(seen.insert(secret.key.to_vec()), "duplicate channel key");
    }

    assert_eq!(seen.len(), 1000);
}

#[tokio::test]
async fn test_handshakes_share_a_store_without_collisions() {
    let config = ChannelConfig::default();
    let server_ctx = ChannelContext::in_memory(config.clone()).unwrap();
    let mut keys = HashSet::new();

    for _ in 0..50 {
        let mut client = NegotiationSession::new(ChannelContext::in_memory(config.clone()).unwrap());
        let request = client.request(None).unwrap();
        let response = NegotiationSession::new(server_ctx.clone())
            .respond(&request)
            .await
            .unwrap();
        let result = client.complete(&response).await.unwrap();
        assert!(keys.insert(result.shared_key().to_vec()));
    }

    assert_eq!(server_ctx.store().len().await, 50);
}

#[tokio::test]
async fn test_envelope_does_not_open_under_other_session() {
    let config = ChannelConfig::default();
    let client_ctx = ChannelContext::in_memory(config.clone()).unwrap();
    let server_ctx = ChannelContext::in_memory(config).unwrap();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let mut client = NegotiationSession::new(client_ctx.clone());
        let request = client.request(None).unwrap();
        let response = NegotiationSession::new(server_ctx.clone())
            .respond(&request)
            .await
            .unwrap();
        client.complete(&response).await.unwrap();
        ids.push(request.session_id().to_string());
    }

    let client = EnvelopeCipher::new(client_ctx);
    let server = EnvelopeCipher::new(server_ctx);
    let (ciphertext, headers) = client.encrypt(&ids[0], b"for session 0").await.unwrap();

    // Replay the envelope against the second session
    let moved = HeaderTriple::new(
        ids[1].clone(),
        headers.wrapped_data_key().to_vec(),
        headers.token().to_vec(),
    );
    let err = server.decrypt(&moved, &ciphertext).await.unwrap_err();
    assert!(matches!(err, CryptoError::AuthFail { .. }));

    // Still fine on its own session
    assert_eq!(
        server.decrypt(&headers, &ciphertext).await.unwrap(),
        b"for session 0"
    );
}
