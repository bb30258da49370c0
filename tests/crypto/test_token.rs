// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Negotiation Token Tests

use shoulder_negotiate::crypto::ecdh::{generate_key_pair, Curve};
use shoulder_negotiate::crypto::token::{
    issue, issue_at, verify, verify_at, EcdsaTokenSigner, EcdsaTokenVerifier, HmacTokenKey,
    TokenPolicy, TOKEN_HEADER_LEN,
};
use std::time::Duration;

#[test]
fn test_ecdsa_token_with_unrelated_key_rejected() {
    let sender = generate_key_pair(Curve::Secp256r1).unwrap();
    let attacker = generate_key_pair(Curve::Secp256r1).unwrap();
    let policy = TokenPolicy::default();

    // Attacker signs over the sender's public key with its own key
    let forged = issue("s", sender.public_key(), &EcdsaTokenSigner::new(&attacker)).unwrap();
    let verifier = EcdsaTokenVerifier::new(Curve::Secp256r1, sender.public_key());
    assert!(!verify("s", sender.public_key(), forged.as_bytes(), &verifier, &policy));
}

#[test]
fn test_hmac_keys_from_different_channels_disagree() {
    let ours = HmacTokenKey::from_channel_key(&[1u8; 16]).unwrap();
    let theirs = HmacTokenKey::from_channel_key(&[2u8; 16]).unwrap();
    let policy = TokenPolicy::default();

    let token = issue("s", b"wrapped", &ours).unwrap();
    assert_eq!(token.as_bytes().len(), TOKEN_HEADER_LEN + 32);
    assert!(verify("s", b"wrapped", token.as_bytes(), &ours, &policy));
    assert!(!verify("s", b"wrapped", token.as_bytes(), &theirs, &policy));
}

#[test]
fn test_any_bit_flip_rejected() {
    let key = HmacTokenKey::from_channel_key(&[7u8; 32]).unwrap();
    let policy = TokenPolicy::default();
    let token = issue_at("s", b"m", &key, 1_000).unwrap();

    for byte in 0..token.as_bytes().len() {
        let mut tampered = token.as_bytes().to_vec();
        tampered[byte] ^= 0x01;
        assert!(!verify_at("s", b"m", &tampered, &key, &policy, 1_000));
    }
}

#[test]
fn test_timestamp_is_authenticated() {
    let key = HmacTokenKey::from_channel_key(&[7u8; 32]).unwrap();
    let policy = TokenPolicy {
        max_age: Duration::from_secs(60),
        max_skew: Duration::from_secs(0),
    };

    // Re-dating an old token to "now" breaks the tag
    let old = issue_at("s", b"m", &key, 1_000).unwrap();
    let mut redated = old.as_bytes().to_vec();
    redated[1..9].copy_from_slice(&5_000u64.to_be_bytes());
    assert!(!verify_at("s", b"m", &redated, &key, &policy, 5_000));
    assert!(!verify_at("s", b"m", old.as_bytes(), &key, &policy, 5_000));
}

#[test]
fn test_tokens_are_not_interchangeable_across_schemes() {
    let pair = generate_key_pair(Curve::Secp256k1).unwrap();
    let hmac = HmacTokenKey::from_channel_key(&[3u8; 24]).unwrap();
    let policy = TokenPolicy::default();

    let ecdsa_token = issue("s", b"m", &EcdsaTokenSigner::new(&pair)).unwrap();
    assert!(!verify("s", b"m", ecdsa_token.as_bytes(), &hmac, &policy));

    let hmac_token = issue("s", b"m", &hmac).unwrap();
    let verifier = EcdsaTokenVerifier::new(Curve::Secp256k1, pair.public_key());
    assert!(!verify("s", b"m", hmac_token.as_bytes(), &verifier, &policy));
}
