//! Cache store adapter and its in-memory implementation.
//!
//! The pipeline only needs `get` and `put` with a TTL. Bodies and tokens live
//! under separate keys and expire independently.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_STORE_EVICT: &str = "ghactivity_store_evict_total";

/// Longest lifetime an entry can be given; larger TTLs are clamped.
const MAX_ENTRY_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store `{op}` failed: {message}")]
    Backend { op: &'static str, message: String },
}

impl StoreError {
    pub fn backend(op: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            op,
            message: message.into(),
        }
    }
}

/// A value read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub bytes: Bytes,
    pub stored_at: OffsetDateTime,
}

/// One pending write for [`CacheStore::put_many`].
#[derive(Debug, Clone)]
pub struct StoreWrite {
    pub key: String,
    pub bytes: Bytes,
    pub ttl: Duration,
}

impl StoreWrite {
    pub fn new(key: impl Into<String>, bytes: impl Into<Bytes>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            bytes: bytes.into(),
            ttl,
        }
    }
}

/// Key/value storage with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedValue>, StoreError>;

    async fn put(&self, key: &str, bytes: Bytes, ttl: Duration) -> Result<(), StoreError>;

    /// Apply several writes as one unit.
    ///
    /// The default applies them in order, so callers list the body before its
    /// token: an interrupted sequence may leave a body without a token but never
    /// a token without its body. Backends that can commit atomically override it.
    async fn put_many(&self, writes: Vec<StoreWrite>) -> Result<(), StoreError> {
        for write in writes {
            self.put(&write.key, write.bytes, write.ttl).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    bytes: Bytes,
    stored_at: OffsetDateTime,
    expires_at: Instant,
}

/// Process-local store bounded by an LRU capacity.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Number of entries currently held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(entries: &mut LruCache<String, Entry>, write: StoreWrite, now: Instant) {
        let entry = Entry {
            bytes: write.bytes,
            stored_at: OffsetDateTime::now_utc(),
            expires_at: now.checked_add(write.ttl.min(MAX_ENTRY_TTL)).unwrap_or(now),
        };
        if let Some((evicted, _)) = entries.push(write.key.clone(), entry)
            && evicted != write.key
        {
            counter!(METRIC_STORE_EVICT).increment(1);
            tracing::debug!(key = %evicted, "evicted cache entry at capacity");
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CachedValue>, StoreError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                return Ok(Some(CachedValue {
                    bytes: entry.bytes.clone(),
                    stored_at: entry.stored_at,
                }));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, bytes: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "put");
        Self::insert(&mut entries, StoreWrite::new(key, bytes, ttl), now);
        Ok(())
    }

    async fn put_many(&self, writes: Vec<StoreWrite>) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "put_many");
        for write in writes {
            Self::insert(&mut entries, write, now);
        }
        Ok(())
    }
}
