//! Aggregate response cache.
//!
//! Pure memoization over read-only computations: entries are written on a
//! miss and leave only by expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;

use ccdi_common::settings::CacheSettings;
use ccdi_common::EntityType;

use crate::filters::FilterSet;

#[async_trait]
pub trait CacheService: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

/// Cache key: `operation:field:filters` or `operation:filters`.
pub fn cache_key(entity: EntityType, operation: &str, field: Option<&str>, filters: &FilterSet) -> String {
    let op = format!("{}_{operation}", entity.as_str());
    match field {
        Some(field) => format!("{op}:{field}:{}", filters.cache_key()),
        None => format!("{op}:{}", filters.cache_key()),
    }
}

// ── In-process implementation ────────────────────────────────────────────────

#[derive(Clone)]
struct Entry {
    bytes: Arc<Vec<u8>>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// `moka`-backed cache where every entry carries its own TTL.
#[derive(Clone)]
pub struct MokaCache {
    inner: Cache<String, Entry>,
}

impl MokaCache {
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.max_capacity)
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[async_trait]
impl CacheService for MokaCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await.map(|e| e.bytes.as_ref().clone())
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let entry = Entry { bytes: Arc::new(value), ttl };
        self.inner.insert(key.to_string(), entry).await;
    }
}

/// A cache that never stores anything; used when caching is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl CacheService for NoCache {
    async fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) {}
}

/// The cache the settings ask for.
pub fn from_settings(settings: &CacheSettings) -> Arc<dyn CacheService> {
    if settings.enabled {
        Arc::new(MokaCache::from_settings(settings))
    } else {
        Arc::new(NoCache)
    }
}
