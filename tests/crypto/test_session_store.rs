// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Store Integration Tests
//!
//! Exercise the store through the `SessionStore` trait object, the way the
//! handshake and envelope layers see it.

use shoulder_negotiate::crypto::aes_gcm::KeyLength;
use shoulder_negotiate::crypto::ecdh::{generate_key_pair, Curve};
use shoulder_negotiate::crypto::kdf::{HashAlgorithm, SharedSecretDeriver};
use shoulder_negotiate::crypto::{CryptoError, MemorySessionStore, SessionStore};
use shoulder_negotiate::NegotiationResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn result(session_id: &str, ttl: Duration) -> Arc<NegotiationResult> {
    let ours = generate_key_pair(Curve::Secp256r1).unwrap();
    let theirs = generate_key_pair(Curve::Secp256r1).unwrap();
    Arc::new(
        NegotiationResult::establish(
            session_id,
            ours,
            theirs.public_key(),
            &SharedSecretDeriver::new(Curve::Secp256r1, HashAlgorithm::Sha256),
            KeyLength::Aes128,
            ttl,
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_put_is_last_write_wins() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let first = result("s", Duration::from_secs(60));
    let second = result("s", Duration::from_secs(60));

    store.put(Arc::clone(&first)).await;
    store.put(Arc::clone(&second)).await;

    let current = store.get("s").await.unwrap();
    assert!(Arc::ptr_eq(&current, &second));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_put_if_absent_replaces_expired_entry() {
    let store = MemorySessionStore::new();
    store.put(result("s", Duration::from_millis(10))).await;
    sleep(Duration::from_millis(30)).await;

    store
        .put_if_absent(result("s", Duration::from_secs(60)))
        .await
        .unwrap();
    assert!(store.get("s").await.is_some());
}

#[tokio::test]
async fn test_concurrent_put_if_absent_single_winner() {
    let store = MemorySessionStore::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let candidate = result("contended", Duration::from_secs(60));
        handles.push(tokio::spawn(async move {
            store.put_if_absent(candidate).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(CryptoError::NegotiationError { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_fetch_distinguishes_missing_and_expired() {
    let store = MemorySessionStore::new();
    store.put(result("short", Duration::from_millis(10))).await;
    sleep(Duration::from_millis(30)).await;

    let expired = store.fetch("short").await.unwrap_err();
    assert!(matches!(expired, CryptoError::SessionExpired { .. }));
    assert!(expired.requires_renegotiation());

    let missing = store.fetch("never").await.unwrap_err();
    assert!(matches!(missing, CryptoError::NoSuchSession { .. }));
    assert!(missing.requires_renegotiation());
}

#[tokio::test]
async fn test_clear_all_and_remove() {
    let store = MemorySessionStore::new();
    store.put(result("a", Duration::from_secs(60))).await;
    store.put(result("b", Duration::from_secs(60))).await;

    assert!(store.remove("a").await);
    assert!(!store.remove("a").await);
    assert_eq!(store.len().await, 1);

    store.clear_all().await;
    assert!(store.is_empty().await);
}
