// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Storage
//!
//! Holds the negotiated result for every live session, keyed by session id.
//! Entries expire at the `expires_at` carried by the result itself; expired
//! entries read as absent and are evicted lazily, by `purge_expired`, or by
//! the background task from [`spawn_purge_task`].
//!
//! **Security**: Results are kept in memory only and never persisted to
//! disk. Dropping the last `Arc` to a result zeroes its secret material.
//!
//! The store is the only shared mutable state in the crate. It is reached
//! through the [`SessionStore`] trait so a distributed backend can replace
//! [`MemorySessionStore`] without touching the handshake or envelope code.

use super::error::{CryptoError, Result};
use crate::negotiation::NegotiationResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Shortest purge period accepted by [`spawn_purge_task`].
const MIN_PURGE_INTERVAL: Duration = Duration::from_millis(10);

/// Shared handle to a negotiated session.
pub type SharedResult = Arc<NegotiationResult>;

/// Keyed, TTL-aware storage of negotiation results.
///
/// Implementations must be safe under concurrent writers: at most one live
/// entry per session id, and no write may be lost or torn.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or overwrite (last write wins).
    async fn put(&self, result: SharedResult);

    /// Insert only if no live entry exists for the id.
    ///
    /// Fails with `NegotiationError` when a live entry is already present.
    /// An expired entry is treated as absent and overwritten.
    async fn put_if_absent(&self, result: SharedResult) -> Result<()>;

    /// Atomically swap in a refreshed result, returning the previous entry
    /// (live or expired) if there was one.
    async fn replace(&self, result: SharedResult) -> Option<SharedResult>;

    /// Live entry for `session_id`.
    async fn get(&self, session_id: &str) -> Option<SharedResult>;

    /// Remove the entry, returning whether one existed.
    async fn remove(&self, session_id: &str) -> bool;

    /// Drop every expired entry, returning how many were removed.
    async fn purge_expired(&self) -> usize;

    /// Number of stored entries, including expired ones not yet purged.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live entry or the error the envelope layer surfaces for it.
    ///
    /// The default can only report `NoSuchSession`; stores that keep
    /// expired entries around override it to report `SessionExpired`.
    async fn fetch(&self, session_id: &str) -> Result<SharedResult> {
        match self.get(session_id).await {
            Some(result) if result.is_expired() => Err(CryptoError::SessionExpired {
                session_id: session_id.to_string(),
            }),
            Some(result) => Ok(result),
            None => Err(CryptoError::NoSuchSession {
                session_id: session_id.to_string(),
            }),
        }
    }
}

/// Periodically drop expired entries from `store`.
///
/// Runs until the returned handle is aborted. The first purge happens
/// immediately; intervals below 10ms are raised to 10ms.
pub fn spawn_purge_task(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    let period = interval.max(MIN_PURGE_INTERVAL);
    tracing::info!("🧹 Session purge task started (every {:?})", period);

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        loop {
            timer.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "purge task evicted expired sessions");
            }
        }
    })
}

/// In-memory session store
///
/// Cloning shares the underlying map.
///
/// # Example
///
/// ```ignore
/// let store = MemorySessionStore::new();
/// store.put(Arc::new(result)).await;
/// let live = store.get("session-123").await;
/// store.remove("session-123").await;
/// ```
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<String, SharedResult>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// [`spawn_purge_task`] over this store's shared map.
    pub fn spawn_purge_task(&self, interval: Duration) -> JoinHandle<()> {
        spawn_purge_task(Arc::new(self.clone()), interval)
    }

    /// Remove every entry. Used for shutdown and tests.
    pub async fn clear_all(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        tracing::info!("🗑️  Cleared all negotiated sessions (count: {})", count);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, result: SharedResult) {
        let mut entries = self.entries.write().await;
        let session_id = result.session_id().to_string();
        entries.insert(session_id.clone(), result);
        tracing::info!(
            "🔑 Negotiated session stored: {} (total sessions: {})",
            session_id,
            entries.len()
        );
    }

    async fn put_if_absent(&self, result: SharedResult) -> Result<()> {
        let mut entries = self.entries.write().await;
        let session_id = result.session_id().to_string();

        if let Some(existing) = entries.get(&session_id) {
            if !existing.is_expired() {
                tracing::warn!(
                    "⚠️  Refusing to overwrite live session {} without refresh",
                    session_id
                );
                return Err(CryptoError::negotiation(format!(
                    "session {} is already negotiated; set refresh to renegotiate",
                    session_id
                )));
            }
        }

        entries.insert(session_id.clone(), result);
        tracing::info!(
            "🔑 Negotiated session stored: {} (total sessions: {})",
            session_id,
            entries.len()
        );
        Ok(())
    }

    async fn replace(&self, result: SharedResult) -> Option<SharedResult> {
        let mut entries = self.entries.write().await;
        let session_id = result.session_id().to_string();
        let previous = entries.insert(session_id.clone(), result);
        tracing::info!(
            "🔄 Negotiated session refreshed: {} (replaced existing: {})",
            session_id,
            previous.is_some()
        );
        previous
    }

    async fn get(&self, session_id: &str) -> Option<SharedResult> {
        let entries = self.entries.read().await;
        entries
            .get(session_id)
            .filter(|result| !result.is_expired())
            .cloned()
    }

    async fn remove(&self, session_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(session_id).is_some();
        if removed {
            tracing::info!(
                "🗑️  Negotiated session cleared: {} (remaining: {})",
                session_id,
                entries.len()
            );
        }
        removed
    }

    async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, result| !result.is_expired());
        let purged = before - entries.len();
        if purged > 0 {
            tracing::info!(
                "⏰ Purged {} expired sessions (remaining: {})",
                purged,
                entries.len()
            );
        }
        purged
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn fetch(&self, session_id: &str) -> Result<SharedResult> {
        {
            let entries = self.entries.read().await;
            match entries.get(session_id) {
                None => {
                    return Err(CryptoError::NoSuchSession {
                        session_id: session_id.to_string(),
                    })
                }
                Some(result) if !result.is_expired() => return Ok(Arc::clone(result)),
                Some(_) => {}
            }
        }

        // Expired: evict unless a concurrent refresh already replaced it
        let mut entries = self.entries.write().await;
        if let Some(result) = entries.get(session_id) {
            if !result.is_expired() {
                return Ok(Arc::clone(result));
            }
            entries.remove(session_id);
        }
        tracing::info!("⏰ Negotiated session expired: {}", session_id);
        Err(CryptoError::SessionExpired {
            session_id: session_id.to_string(),
        })
    }
}
