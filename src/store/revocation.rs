//! Revocation Store
//!
//! Maps a revocation handle to the subject it was issued for, with a TTL equal
//! to the token's validity window. Presence of the key is the only thing that
//! makes a token honored; absence is a normal `Ok(false)`. A store that cannot
//! be reached reports `RevocationStoreError::Unavailable` and never answers
//! "absent" on its own.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::AppError;

// Upper bound on an in-memory entry's lifetime; longer TTLs are clamped to it.
const MAX_ENTRY_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn put(&self, handle: &str, subject: &str, ttl: Duration) -> Result<(), AppError>;

    /// Deleting an absent handle is not an error
    async fn delete(&self, handle: &str) -> Result<(), AppError>;

    async fn exists(&self, handle: &str) -> Result<bool, AppError>;
}

/// Redis-backed store. Keys are the handles themselves.
#[derive(Clone)]
pub struct RedisRevocationStore {
    redis: ConnectionManager,
}

impl RedisRevocationStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Open a managed connection to `url`
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager))
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn put(&self, handle: &str, subject: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        // Redis rejects EX 0
        let seconds = ttl.as_secs().max(1);

        let _: () = redis::cmd("SET")
            .arg(handle)
            .arg(subject)
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await?;

        tracing::debug!(ttl_secs = seconds, "Revocation handle stored");
        Ok(())
    }

    async fn delete(&self, handle: &str) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        let removed: i64 = conn.del(handle).await?;

        tracing::debug!(removed = removed, "Revocation handle deleted");
        Ok(())
    }

    async fn exists(&self, handle: &str) -> Result<bool, AppError> {
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(handle).await?;
        Ok(exists)
    }
}

/// In-process store with lazy TTL expiry.
///
/// Only meaningful for a single server process; used when no Redis URL is
/// configured and by the test suites.
#[derive(Default)]
pub struct InMemoryRevocationStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) handles
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, deadline)| *deadline > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subject stored under `handle`, if still live
    pub async fn subject(&self, handle: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(handle)
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(subject, _)| subject.clone())
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn put(&self, handle: &str, subject: &str, ttl: Duration) -> Result<(), AppError> {
        let now = Instant::now();
        let deadline = now + ttl.min(MAX_ENTRY_TTL);
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, d)| *d > now);
        entries.insert(handle.to_string(), (subject.to_string(), deadline));
        Ok(())
    }

    async fn delete(&self, handle: &str) -> Result<(), AppError> {
        self.entries.write().await.remove(handle);
        Ok(())
    }

    async fn exists(&self, handle: &str) -> Result<bool, AppError> {
        Ok(self.subject(handle).await.is_some())
    }
}
