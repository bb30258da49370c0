// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-End Envelope Tests
//!
//! A "shoulder" service and a "server" negotiate once, then exchange
//! messages in both directions with a fresh data key per message.

use shoulder_negotiate::crypto::aes_gcm::KeyLength;
use shoulder_negotiate::crypto::ecdh::Curve;
use shoulder_negotiate::envelope::{HeaderTriple, BODY_FIELD};
use shoulder_negotiate::{
    ChannelConfig, ChannelContext, EnvelopeCipher, EnvelopeTokenScheme, NegotiationSession,
};
use std::collections::BTreeMap;

struct Peers {
    shoulder: EnvelopeCipher,
    server: EnvelopeCipher,
    session_id: String,
}

async fn negotiate(config: ChannelConfig) -> Peers {
    let shoulder_ctx = ChannelContext::in_memory(config.clone()).unwrap();
    let server_ctx = ChannelContext::in_memory(config).unwrap();

    let mut requester = NegotiationSession::new(shoulder_ctx.clone());
    let mut responder = NegotiationSession::new(server_ctx.clone());
    let request = requester.request(None).unwrap();
    let response = responder.respond(&request).await.unwrap();
    requester.complete(&response).await.unwrap();

    Peers {
        shoulder: EnvelopeCipher::new(shoulder_ctx),
        server: EnvelopeCipher::new(server_ctx),
        session_id: request.session_id().to_string(),
    }
}

#[tokio::test]
async fn test_hello_shoulder_hello_server() {
    let peers = negotiate(ChannelConfig::default()).await;

    // shoulder -> server
    let (ciphertext, headers_1) = peers
        .shoulder
        .encrypt(&peers.session_id, b"hello shoulder")
        .await
        .unwrap();
    let wire = headers_1.to_headers();
    let received = HeaderTriple::from_headers(wire.iter().map(|(k, v)| (*k, v.as_str()))).unwrap();
    let plaintext = peers.server.decrypt(&received, &ciphertext).await.unwrap();
    assert_eq!(plaintext, b"hello shoulder");

    // server -> shoulder
    let (ciphertext, headers_2) = peers
        .server
        .encrypt(&peers.session_id, b"hello server")
        .await
        .unwrap();
    let plaintext = peers.shoulder.decrypt(&headers_2, &ciphertext).await.unwrap();
    assert_eq!(plaintext, b"hello server");

    // Each message carried its own data key
    let d1 = peers.server.unwrap_data_key(&headers_1).await.unwrap();
    let d2 = peers.shoulder.unwrap_data_key(&headers_2).await.unwrap();
    assert_eq!(d1.len(), 16);
    assert_ne!(&*d1, &*d2);
}

#[tokio::test]
async fn test_round_trip_all_configurations() {
    for curve in [Curve::Secp256r1, Curve::Secp256k1] {
        for key_length in KeyLength::ALL {
            for envelope_token in [EnvelopeTokenScheme::Ecdsa, EnvelopeTokenScheme::Hmac] {
                let peers = negotiate(ChannelConfig {
                    curve,
                    key_length,
                    envelope_token,
                    ..ChannelConfig::default()
                })
                .await;

                let mut fields = BTreeMap::new();
                fields.insert("ssn".to_string(), b"078-05-1120".to_vec());
                fields.insert("empty".to_string(), Vec::new());

                let sealed = peers.shoulder.seal(&peers.session_id, &fields).await.unwrap();
                let opened = peers.server.open(&sealed.headers, &sealed.fields).await.unwrap();
                assert_eq!(opened, fields);

                let data_key = peers.server.unwrap_data_key(&sealed.headers).await.unwrap();
                assert_eq!(data_key.len(), key_length.bytes());
            }
        }
    }
}

#[tokio::test]
async fn test_same_plaintext_encrypts_differently() {
    let peers = negotiate(ChannelConfig::default()).await;

    let (a, headers_a) = peers.shoulder.encrypt(&peers.session_id, b"same").await.unwrap();
    let (b, headers_b) = peers.shoulder.encrypt(&peers.session_id, b"same").await.unwrap();

    assert_ne!(a, b);
    assert_ne!(headers_a.wrapped_data_key(), headers_b.wrapped_data_key());
    assert_ne!(headers_a.token(), headers_b.token());
}

#[tokio::test]
async fn test_only_named_fields_are_touched() {
    let peers = negotiate(ChannelConfig::default()).await;

    let mut fields = BTreeMap::new();
    fields.insert("password".to_string(), b"hunter2".to_vec());
    let sealed = peers.shoulder.seal(&peers.session_id, &fields).await.unwrap();

    assert_eq!(sealed.fields.len(), 1);
    assert!(sealed.fields.contains_key("password"));
    assert!(!sealed.fields.contains_key(BODY_FIELD));
}
