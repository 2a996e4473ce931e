//! Session Cache: the key/value store holding `session_id -> token_bundle`,
//! `access_token -> client_token_bundle`, and the email rate-limit hash.
//!
//! The source assumes an external store (Redis) offering `GET`, `SET` with
//! TTL, `DEL`, `HGET`, `HSET`, and a distinguishable not-found error. This
//! module expresses that as a trait so the orchestrator never depends on a
//! concrete store, and ships an in-process implementation suitable for a
//! single-replica deployment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::{ClientTokenBundle, TokenBundle};

/// Errors returned by a `SessionCache` implementation.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("not found")]
    NotFound,

    #[error("cache transport error: {0}")]
    Transport(String),
}

/// Key/value contract the orchestrator depends on. No atomicity is
/// required across operations; the rate-limit hash field increment is a
/// tolerated read-modify-write race (see `orchestrator::AccessForClientToken`).
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get_bundle(&self, session_id: &str) -> Result<TokenBundle, CacheError>;
    async fn put_bundle(&self, session_id: &str, bundle: TokenBundle, ttl: Duration);
    async fn delete_bundle(&self, session_id: &str);

    async fn get_client_token(&self, access_token: &str) -> Result<ClientTokenBundle, CacheError>;
    async fn put_client_token(&self, access_token: &str, bundle: ClientTokenBundle, ttl: Duration);

    async fn hget(&self, hash_key: &str, field: &str) -> Option<String>;
    async fn hset(&self, hash_key: &str, field: &str, value: String);
}

struct Expiring<T> {
    value: T,
    expires_at: SystemTime,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: SystemTime::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    fn remaining(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or_default()
    }
}

/// In-process, TTL-aware session cache backed by a concurrent map. The
/// natural production upgrade for a multi-replica deployment is a
/// Redis-backed implementation of the same trait (see DESIGN.md); nothing
/// else in the orchestrator needs to change.
#[derive(Default)]
pub struct InMemorySessionCache {
    bundles: DashMap<String, Expiring<TokenBundle>>,
    client_tokens: DashMap<String, Expiring<ClientTokenBundle>>,
    hashes: DashMap<String, HashMap<String, String>>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Remaining time-to-live for a session bundle, if present and live.
    /// Used by tests asserting TTL re-arming (Testable Property 3).
    pub fn bundle_ttl(&self, session_id: &str) -> Option<Duration> {
        self.bundles.get(session_id).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.remaining())
            }
        })
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn get_bundle(&self, session_id: &str) -> Result<TokenBundle, CacheError> {
        match self.bundles.get(session_id) {
            Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
            Some(_) => {
                drop(self.bundles.remove(session_id));
                Err(CacheError::NotFound)
            }
            None => Err(CacheError::NotFound),
        }
    }

    async fn put_bundle(&self, session_id: &str, bundle: TokenBundle, ttl: Duration) {
        self.bundles
            .insert(session_id.to_string(), Expiring::new(bundle, ttl));
    }

    async fn delete_bundle(&self, session_id: &str) {
        self.bundles.remove(session_id);
    }

    async fn get_client_token(&self, access_token: &str) -> Result<ClientTokenBundle, CacheError> {
        match self.client_tokens.get(access_token) {
            Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
            Some(_) => {
                drop(self.client_tokens.remove(access_token));
                Err(CacheError::NotFound)
            }
            None => Err(CacheError::NotFound),
        }
    }

    async fn put_client_token(&self, access_token: &str, bundle: ClientTokenBundle, ttl: Duration) {
        self.client_tokens
            .insert(access_token.to_string(), Expiring::new(bundle, ttl));
    }

    async fn hget(&self, hash_key: &str, field: &str) -> Option<String> {
        self.hashes
            .get(hash_key)
            .and_then(|fields| fields.get(field).cloned())
    }

    async fn hset(&self, hash_key: &str, field: &str, value: String) {
        self.hashes
            .entry(hash_key.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(session_id: &str) -> TokenBundle {
        TokenBundle {
            access_token: "A".into(),
            refresh_token: "R".into(),
            id_token: None,
            expires_in: 3600,
            expires_at: "Mon, 02 Jan 2006 15:04:05 MST".into(),
            session_id: session_id.into(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = InMemorySessionCache::new();
        cache
            .put_bundle("S", bundle("S"), Duration::from_secs(60))
            .await;
        let got = cache.get_bundle("S").await.unwrap();
        assert_eq!(got.access_token, "A");
        assert_eq!(got.session_id, "S");
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let cache = InMemorySessionCache::new();
        assert!(matches!(
            cache.get_bundle("missing").await,
            Err(CacheError::NotFound)
        ));
    }

    #[tokio::test]
    async fn expired_bundle_is_not_found() {
        let cache = InMemorySessionCache::new();
        cache
            .put_bundle("S", bundle("S"), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            cache.get_bundle("S").await,
            Err(CacheError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = InMemorySessionCache::new();
        cache
            .put_bundle("S", bundle("S"), Duration::from_secs(60))
            .await;
        cache.delete_bundle("S").await;
        assert!(matches!(
            cache.get_bundle("S").await,
            Err(CacheError::NotFound)
        ));
    }

    #[tokio::test]
    async fn hget_hset_round_trip() {
        let cache = InMemorySessionCache::new();
        assert_eq!(cache.hget("redisEmailCountKey", "u@x").await, None);
        cache
            .hset("redisEmailCountKey", "u@x", "1".to_string())
            .await;
        assert_eq!(
            cache.hget("redisEmailCountKey", "u@x").await,
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn put_bundle_rearms_ttl() {
        let cache = InMemorySessionCache::new();
        cache
            .put_bundle("S", bundle("S"), Duration::from_secs(1))
            .await;
        cache
            .put_bundle("S", bundle("S"), Duration::from_secs(3600))
            .await;
        let ttl = cache.bundle_ttl("S").unwrap();
        assert!(ttl > Duration::from_secs(3000));
    }
}
