// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Property Tests
//!
//! Randomised checks over the pure layers: derivation determinism, cipher
//! round trips and token binding.

use proptest::prelude::*;
use shoulder_negotiate::crypto::aes_gcm::{self, KeyLength};
use shoulder_negotiate::crypto::ecdh::Curve;
use shoulder_negotiate::crypto::kdf::{HashAlgorithm, SharedSecretDeriver};
use shoulder_negotiate::crypto::token::{issue_at, verify_at, HmacTokenKey, TokenPolicy};

fn key_length() -> impl Strategy<Value = KeyLength> {
    prop_oneof![
        Just(KeyLength::Aes128),
        Just(KeyLength::Aes192),
        Just(KeyLength::Aes256),
    ]
}

fn hash() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![Just(HashAlgorithm::Sha256), Just(HashAlgorithm::Sha512)]
}

proptest! {
    #[test]
    fn derive_is_pure(raw in prop::array::uniform32(any::<u8>()), length in key_length(), hash in hash()) {
        let deriver = SharedSecretDeriver::new(Curve::Secp256r1, hash);
        let a = deriver.derive(&raw, length).unwrap();
        let b = deriver.derive(&raw, length).unwrap();

        prop_assert_eq!(&a.key[..], &b.key[..]);
        prop_assert_eq!(&a.iv[..], &b.iv[..]);
        prop_assert_eq!(a.key.len(), length.bytes());
    }

    #[test]
    fn symmetric_round_trip(
        key in prop::collection::vec(any::<u8>(), 32),
        iv in prop::array::uniform16(any::<u8>()),
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
        aad in prop::collection::vec(any::<u8>(), 0..64),
        length in key_length(),
    ) {
        let key = &key[..length.bytes()];
        let ciphertext = aes_gcm::encrypt(key, &iv, &plaintext, &aad).unwrap();
        let decrypted = aes_gcm::decrypt(key, &iv, &ciphertext, &aad).unwrap();
        prop_assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn token_binds_session_and_material(
        session_a in "[a-z0-9-]{1,40}",
        session_b in "[a-z0-9-]{1,40}",
        material in prop::collection::vec(any::<u8>(), 1..96),
        issued_at in 1_000u64..1_000_000_000,
    ) {
        let key = HmacTokenKey::from_channel_key(&[0x5Au8; 16]).unwrap();
        let policy = TokenPolicy::default();
        let token = issue_at(&session_a, &material, &key, issued_at).unwrap();

        prop_assert!(verify_at(&session_a, &material, token.as_bytes(), &key, &policy, issued_at));
        if session_a != session_b {
            prop_assert!(!verify_at(&session_b, &material, token.as_bytes(), &key, &policy, issued_at));
        }
    }
}
