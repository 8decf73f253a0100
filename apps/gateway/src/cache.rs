//! # Availability Cache
//!
//! Short-lived memo for batched stock lookups. A till polls availability for
//! the whole cart on every change; identical batches within the TTL are
//! answered without touching the database.
//!
//! ```text
//! key = pos_stock:<warehouse>:<sha256(codes joined by ",")[..12]>
//!
//! ┌──────────────┐   hit    ┌──────────────────────┐
//! │ StockService │ ───────► │ AvailabilityCache    │
//! │              │ ◄─────── │  Memory │ Redis      │
//! └──────────────┘   miss   └──────────────────────┘
//!        │ compute, then set(key, value, ttl)
//! ```
//!
//! There is no invalidation: a sale does not clear cached figures, they
//! simply age out.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use tillpoint_core::ItemAvailability;

/// Availability per item code.
pub type AvailabilityMap = BTreeMap<String, ItemAvailability>;

/// Hex characters of the digest kept in the key.
const KEY_DIGEST_LEN: usize = 12;

/// Builds the cache key for one warehouse and an ordered, deduplicated code list.
///
/// ## Example
/// ```rust
/// use tillpoint_gateway::cache::cache_key;
///
/// let key = cache_key("Stores - Co", &["ITEM1".to_string(), "ITEM2".to_string()]);
/// assert!(key.starts_with("pos_stock:Stores - Co:"));
/// assert_eq!(key.len(), "pos_stock:Stores - Co:".len() + 12);
/// ```
pub fn cache_key(warehouse: &str, item_codes: &[String]) -> String {
    let digest = Sha256::digest(item_codes.join(",").as_bytes());
    let hex = hex::encode(digest);
    format!("pos_stock:{}:{}", warehouse, &hex[..KEY_DIGEST_LEN])
}

/// Cache backend failures. Callers fall back to computing the value.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

// =============================================================================
// Cache
// =============================================================================

/// The availability cache, in-process or shared through Redis.
pub enum AvailabilityCache {
    Memory(MemoryCache),
    Redis(RedisCache),
}

impl AvailabilityCache {
    pub fn memory() -> Self {
        AvailabilityCache::Memory(MemoryCache::default())
    }

    /// Connects the Redis backend.
    pub async fn redis(client: redis::Client) -> Result<Self, CacheError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(AvailabilityCache::Redis(RedisCache { conn }))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AvailabilityCache::Memory(_) => "memory",
            AvailabilityCache::Redis(_) => "redis",
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<AvailabilityMap>, CacheError> {
        match self {
            AvailabilityCache::Memory(cache) => Ok(cache.get(key).await),
            AvailabilityCache::Redis(cache) => cache.get(key).await,
        }
    }

    pub async fn set(&self, key: &str, value: &AvailabilityMap, ttl: Duration) -> Result<(), CacheError> {
        match self {
            AvailabilityCache::Memory(cache) => {
                cache.set(key, value.clone(), ttl).await;
                Ok(())
            }
            AvailabilityCache::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    /// Round-trips a PING to the backend.
    pub async fn ping(&self) -> Result<(), CacheError> {
        match self {
            AvailabilityCache::Memory(_) => Ok(()),
            AvailabilityCache::Redis(cache) => {
                let mut conn = cache.conn.clone();
                let _: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(())
            }
        }
    }
}

// =============================================================================
// In-process Backend
// =============================================================================

/// Per-process cache used when no Redis is configured.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, AvailabilityMap)>>,
}

impl MemoryCache {
    async fn get(&self, key: &str) -> Option<AvailabilityMap> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|(expires_at, _)| *expires_at > Instant::now())
            .map(|(_, value)| value.clone())
    }

    async fn set(&self, key: &str, value: AvailabilityMap, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (expires_at, _)| *expires_at > now);
        entries.insert(key.to_string(), (now + ttl, value));
    }
}

// =============================================================================
// Redis Backend
// =============================================================================

/// Cache shared by every gateway instance.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    async fn get(&self, key: &str) -> Result<Option<AvailabilityMap>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &AvailabilityMap, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, payload, ttl.as_secs().max(1)).await?;
        debug!(key, "Cached availability in Redis");
        Ok(())
    }
}
