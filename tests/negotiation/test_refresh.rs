// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Refresh Tests
//!
//! An expired session is renegotiated under the same id with
//! `refresh = true`; the responder replaces its stale entry. A live entry is
//! only replaced for the peer that holds it.

use shoulder_negotiate::{
    ChannelConfig, ChannelContext, CryptoError, EnvelopeCipher, NegotiationRequest,
    NegotiationSession, NegotiationState, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn short_lived() -> ChannelConfig {
    ChannelConfig {
        session_ttl_secs: 1,
        ..ChannelConfig::default()
    }
}

#[tokio::test]
async fn test_refresh_after_expiry() {
    let config = short_lived();
    let client_ctx = ChannelContext::in_memory(config.clone()).unwrap();
    let server_ctx = ChannelContext::in_memory(config).unwrap();

    let mut client = NegotiationSession::new(client_ctx.clone());
    let request = client.request(None).unwrap();
    let session_id = request.session_id().to_string();
    let response = NegotiationSession::new(server_ctx.clone())
        .respond(&request)
        .await
        .unwrap();
    let first = client.complete(&response).await.unwrap();

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(client.state(), NegotiationState::Expired);

    let cipher = EnvelopeCipher::new(client_ctx.clone());
    let err = cipher.encrypt(&session_id, b"late").await.unwrap_err();
    assert!(err.requires_renegotiation());

    // Renegotiate on the same id
    let refresh = client.request(None).unwrap();
    assert!(refresh.refresh());
    assert_eq!(refresh.session_id(), session_id);
    assert_eq!(client.state(), NegotiationState::Refreshing);

    let response = NegotiationSession::new(server_ctx.clone())
        .respond(&refresh)
        .await
        .unwrap();
    let second = client.complete(&response).await.unwrap();

    assert_eq!(client.state(), NegotiationState::Established);
    assert_ne!(first.shared_key(), second.shared_key());

    let server_side = server_ctx.store().get(&session_id).await.unwrap();
    assert_eq!(server_side.shared_key(), second.shared_key());
}

struct Channel {
    client_ctx: ChannelContext,
    server_ctx: ChannelContext,
    client: NegotiationSession,
    session_id: String,
}

async fn established(config: ChannelConfig) -> Channel {
    let client_ctx = ChannelContext::in_memory(config.clone()).unwrap();
    let server_ctx = ChannelContext::in_memory(config).unwrap();

    let mut client = NegotiationSession::new(client_ctx.clone());
    let request = client.request(None).unwrap();
    let response = NegotiationSession::new(server_ctx.clone())
        .respond(&request)
        .await
        .unwrap();
    client.complete(&response).await.unwrap();

    Channel {
        client_ctx,
        server_ctx,
        client,
        session_id: request.session_id().to_string(),
    }
}

async fn assert_channel_works(channel: &Channel) {
    let (ciphertext, headers) = EnvelopeCipher::new(channel.client_ctx.clone())
        .encrypt(&channel.session_id, b"still ours")
        .await
        .unwrap();
    let plaintext = EnvelopeCipher::new(channel.server_ctx.clone())
        .decrypt(&headers, &ciphertext)
        .await
        .unwrap();
    assert_eq!(plaintext, b"still ours");
}

#[tokio::test]
async fn test_session_holder_refreshes_live_entry() {
    let mut channel = established(ChannelConfig::default()).await;
    let stale = channel.server_ctx.store().get(&channel.session_id).await.unwrap();

    let refresh = channel.client.request(None).unwrap();
    assert!(refresh.refresh());
    assert!(refresh.proof().is_some());

    let response = NegotiationSession::new(channel.server_ctx.clone())
        .respond(&refresh)
        .await
        .unwrap();
    channel.client.complete(&response).await.unwrap();

    let fresh = channel.server_ctx.store().get(&channel.session_id).await.unwrap();
    assert!(!Arc::ptr_eq(&stale, &fresh));
    assert_eq!(channel.server_ctx.store().len().await, 1);
    assert_channel_works(&channel).await;
}

#[tokio::test]
async fn test_replayed_refresh_rejected() {
    let mut channel = established(ChannelConfig::default()).await;

    let refresh = channel.client.request(None).unwrap();
    let response = NegotiationSession::new(channel.server_ctx.clone())
        .respond(&refresh)
        .await
        .unwrap();
    channel.client.complete(&response).await.unwrap();
    let current = channel.server_ctx.store().get(&channel.session_id).await.unwrap();

    // Same captured request, sent again inside the token window
    let err = NegotiationSession::new(channel.server_ctx.clone())
        .respond(&refresh)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CryptoError::NegotiationError { .. } | CryptoError::AuthFail { .. }
    ));

    let after = channel.server_ctx.store().get(&channel.session_id).await.unwrap();
    assert!(Arc::ptr_eq(&current, &after));
    assert_channel_works(&channel).await;
}

#[tokio::test]
async fn test_third_party_cannot_refresh_live_session() {
    let channel = established(ChannelConfig::default()).await;
    let live = channel.server_ctx.store().get(&channel.session_id).await.unwrap();

    // Knows the id, not the channel secret
    let mut outsider =
        NegotiationSession::new(ChannelContext::in_memory(ChannelConfig::default()).unwrap());
    let refresh = outsider.refresh(&channel.session_id).await.unwrap();
    assert!(refresh.refresh());
    assert!(refresh.proof().is_none());

    let err = NegotiationSession::new(channel.server_ctx.clone())
        .respond(&refresh)
        .await
        .unwrap_err();
    assert!(matches!(err, CryptoError::AuthFail { .. }));

    let after = channel.server_ctx.store().get(&channel.session_id).await.unwrap();
    assert!(Arc::ptr_eq(&live, &after));
    assert_channel_works(&channel).await;
}

#[tokio::test]
async fn test_proof_bound_to_request_key() {
    let mut channel = established(ChannelConfig::default()).await;
    let genuine = channel.client.request(None).unwrap();

    // Outsider reuses the genuine proof with its own key and token
    let mut outsider =
        NegotiationSession::new(ChannelContext::in_memory(ChannelConfig::default()).unwrap());
    let own = outsider.refresh(&channel.session_id).await.unwrap();
    let forged = NegotiationRequest::new(
        own.session_id().to_string(),
        own.public_key().to_vec(),
        own.token().to_vec(),
        true,
    )
    .with_proof(genuine.proof().unwrap().to_vec());

    let err = NegotiationSession::new(channel.server_ctx.clone())
        .respond(&forged)
        .await
        .unwrap_err();
    assert!(matches!(err, CryptoError::AuthFail { .. }));
}

#[tokio::test]
async fn test_restarted_requester_refreshes_from_store() {
    let channel = established(ChannelConfig::default()).await;

    // New session object over the same client store
    let mut restarted = NegotiationSession::new(channel.client_ctx.clone());
    let refresh = restarted.refresh(&channel.session_id).await.unwrap();
    assert!(refresh.proof().is_some());
    assert_eq!(restarted.state(), NegotiationState::Refreshing);

    let response = NegotiationSession::new(channel.server_ctx.clone())
        .respond(&refresh)
        .await
        .unwrap();
    restarted.complete(&response).await.unwrap();
    assert_channel_works(&channel).await;
}

#[tokio::test]
async fn test_caller_chosen_id_opens_new_session() {
    let config = ChannelConfig::default();
    let server_ctx = ChannelContext::in_memory(config.clone()).unwrap();

    let mut client = NegotiationSession::new(ChannelContext::in_memory(config.clone()).unwrap());
    let request = client.request(Some("s1")).unwrap();
    assert_eq!(request.session_id(), "s1");
    assert!(!request.refresh());
    assert_eq!(client.state(), NegotiationState::Requested);

    let response = NegotiationSession::new(server_ctx.clone())
        .respond(&request)
        .await
        .unwrap();
    client.complete(&response).await.unwrap();

    // A second opener of the same live id is refused, not merged
    let mut other = NegotiationSession::new(ChannelContext::in_memory(config).unwrap());
    let duplicate = other.request(Some("s1")).unwrap();
    let err = NegotiationSession::new(server_ctx.clone())
        .respond(&duplicate)
        .await
        .unwrap_err();
    assert!(matches!(err, CryptoError::NegotiationError { .. }));
}

#[tokio::test]
async fn test_refresh_while_request_pending_is_invalid() {
    let mut client = NegotiationSession::new(ChannelContext::in_memory(short_lived()).unwrap());
    client.request(None).unwrap();

    let err = client.request(Some("other")).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidState { .. }));
}
