use std::fmt::Display;

use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

use crate::models::MediaType;

/// Typed cache keys. The `Display` output is the wire namespace and must stay
/// stable across releases — existing deployments have entries under these
/// prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Watch-history recommendations: `user:{id}:recent-{mediaType}`
    UserRecent {
        user_id: String,
        media_type: MediaType,
    },
    /// Search responses: `{mediaType}:search:{normalizedQuery}`
    SearchResults {
        media_type: MediaType,
        query: String,
    },
    /// Per-title metadata by display name: `{mediaType}:name:{normalizedTitle}`
    MetaByName {
        media_type: MediaType,
        title: String,
    },
    /// Per-title metadata by canonical id: `{mediaType}:{canonicalId}`
    MetaById { media_type: MediaType, id: String },
}

/// Lowercase + trim, shared by the name and search namespaces
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::UserRecent {
                user_id,
                media_type,
            } => write!(f, "user:{}:recent-{}", user_id, media_type),
            CacheKey::SearchResults { media_type, query } => {
                write!(f, "{}:search:{}", media_type, normalize(query))
            }
            CacheKey::MetaByName { media_type, title } => {
                write!(f, "{}:name:{}", media_type, normalize(title))
            }
            CacheKey::MetaById { media_type, id } => write!(f, "{}:{}", media_type, id),
        }
    }
}

/// Exact-match result cache contract.
///
/// A read that fails at the transport level degrades to a miss: the pipeline
/// answers correctly either way, merely uncached. Writes are best-effort and
/// never surface errors to the request path.
#[async_trait::async_trait]
pub trait ResultCache: Send + Sync {
    async fn get_raw(&self, key: &CacheKey) -> Option<String>;
    async fn set_raw(&self, key: &CacheKey, value: String, ttl_seconds: u64);
}

/// Typed read through any `ResultCache`
pub async fn cache_get<T: DeserializeOwned>(cache: &dyn ResultCache, key: &CacheKey) -> Option<T> {
    let json = cache.get_raw(key).await?;
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            // A payload we can no longer parse is as good as absent
            tracing::warn!(key = %key, error = %e, "Discarding undeserializable cache entry");
            None
        }
    }
}

/// Typed write through any `ResultCache`
pub async fn cache_set<T: Serialize>(
    cache: &dyn ResultCache,
    key: &CacheKey,
    value: &T,
    ttl_seconds: u64,
) {
    match serde_json::to_string(value) {
        Ok(json) => cache.set_raw(key, json, ttl_seconds).await,
        Err(e) => tracing::error!(key = %key, error = %e, "Cache serialization error"),
    }
}

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Redis-backed exact-match cache
#[derive(Clone)]
pub struct RedisCache {
    redis_client: Client,
}

impl RedisCache {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }
}

#[async_trait::async_trait]
impl ResultCache for RedisCache {
    async fn get_raw(&self, key: &CacheKey) -> Option<String> {
        let mut conn = match self.redis_client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache unreachable, treating as miss");
                return None;
            }
        };

        match conn.get::<_, Option<String>>(format!("{}", key)).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn set_raw(&self, key: &CacheKey, value: String, ttl_seconds: u64) {
        let mut conn = match self.redis_client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache unreachable, skipping write");
                return;
            }
        };

        if let Err(e) = conn
            .set_ex::<_, _, ()>(format!("{}", key), value, ttl_seconds)
            .await
        {
            tracing::warn!(key = %key, error = %e, "Cache write failed");
        }
    }
}

/// Backs the cache-disable flag: every read misses, every write is dropped
#[derive(Debug, Clone, Default)]
pub struct NoopCache;

#[async_trait::async_trait]
impl ResultCache for NoopCache {
    async fn get_raw(&self, _key: &CacheKey) -> Option<String> {
        None
    }

    async fn set_raw(&self, _key: &CacheKey, _value: String, _ttl_seconds: u64) {}
}

/// In-process cache for tests and single-process development. Honors TTLs.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: tokio::sync::RwLock<
        std::collections::HashMap<String, (String, std::time::Instant, u64)>,
    >,
}

#[async_trait::async_trait]
impl ResultCache for MemoryCache {
    async fn get_raw(&self, key: &CacheKey) -> Option<String> {
        let entries = self.entries.read().await;
        let (value, written_at, ttl_seconds) = entries.get(&format!("{}", key))?;
        if written_at.elapsed().as_secs() >= *ttl_seconds {
            return None;
        }
        Some(value.clone())
    }

    async fn set_raw(&self, key: &CacheKey, value: String, ttl_seconds: u64) {
        self.entries.write().await.insert(
            format!("{}", key),
            (value, std::time::Instant::now(), ttl_seconds),
        );
    }
}
