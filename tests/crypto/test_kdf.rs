// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared Secret Derivation Tests

use shoulder_negotiate::crypto::aes_gcm::KeyLength;
use shoulder_negotiate::crypto::ecdh::{compute_shared_secret, generate_key_pair, Curve};
use shoulder_negotiate::crypto::kdf::{HashAlgorithm, SharedSecretDeriver};
use shoulder_negotiate::crypto::CryptoError;

// SHA-256 of 32 zero bytes
const ZERO_DIGEST: &str = "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925";

#[test]
fn test_known_answer_sha256() {
    let deriver = SharedSecretDeriver::new(Curve::Secp256r1, HashAlgorithm::Sha256);
    let secret = deriver.derive(&[0u8; 32], KeyLength::Aes128).unwrap();

    assert_eq!(hex::encode(&*secret.key), &ZERO_DIGEST[..32]);
    assert_eq!(hex::encode(&*secret.iv), &ZERO_DIGEST[32..]);
}

#[test]
fn test_aes256_key_overlaps_iv_with_sha256() {
    let deriver = SharedSecretDeriver::new(Curve::Secp256r1, HashAlgorithm::Sha256);
    let secret = deriver.derive(&[0u8; 32], KeyLength::Aes256).unwrap();

    assert_eq!(hex::encode(&*secret.key), ZERO_DIGEST);
    assert_eq!(&secret.key[16..], &secret.iv[..]);
}

#[test]
fn test_derive_is_deterministic() {
    let deriver = SharedSecretDeriver::new(Curve::Secp256k1, HashAlgorithm::Sha512);
    let raw = [0xA5u8; 32];

    for length in KeyLength::ALL {
        let a = deriver.derive(&raw, length).unwrap();
        let b = deriver.derive(&raw, length).unwrap();
        assert_eq!(&*a.key, &*b.key);
        assert_eq!(&*a.iv, &*b.iv);
        assert_eq!(a.key.len(), length.bytes());
    }
}

#[test]
fn test_peers_derive_identical_secret() {
    let alice = generate_key_pair(Curve::Secp256r1).unwrap();
    let bob = generate_key_pair(Curve::Secp256r1).unwrap();
    let deriver = SharedSecretDeriver::new(Curve::Secp256r1, HashAlgorithm::Sha256);

    let a = deriver
        .derive(&compute_shared_secret(&alice, bob.public_key()).unwrap(), KeyLength::Aes192)
        .unwrap();
    let b = deriver
        .derive(&compute_shared_secret(&bob, alice.public_key()).unwrap(), KeyLength::Aes192)
        .unwrap();

    assert_eq!(&*a.key, &*b.key);
    assert_eq!(&*a.iv, &*b.iv);
}

#[test]
fn test_illegal_secret_length() {
    let deriver = SharedSecretDeriver::new(Curve::Secp256k1, HashAlgorithm::Sha256);
    for len in [0usize, 16, 33, 64] {
        let err = deriver.derive(&vec![1u8; len], KeyLength::Aes128).unwrap_err();
        match err {
            CryptoError::IllegalSecretLength { expected, actual } => {
                assert_eq!(expected, 32);
                assert_eq!(actual, len);
            }
            other => panic!("Expected IllegalSecretLength, got {:?}", other),
        }
    }
}

#[test]
fn test_debug_does_not_print_key() {
    let deriver = SharedSecretDeriver::new(Curve::Secp256r1, HashAlgorithm::Sha256);
    let secret = deriver.derive(&[0u8; 32], KeyLength::Aes128).unwrap();
    let printed = format!("{:?}", secret);
    assert!(!printed.contains(&ZERO_DIGEST[..32]));
}
