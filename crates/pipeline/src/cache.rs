//! Two-tier cache
//!
//! L1 is a per-process LRU with per-namespace capacity and TTL; L2 is a
//! distributed KV store behind the `KeyValueStore` trait, with the no-op
//! store standing in when none is configured. Reads probe L1 first, then L2
//! with promote-on-hit; writes go through to both. L2 failures are logged
//! and swallowed, degrading to L1-only.

use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use parts_search_config::constants::cache as bounds;
use parts_search_core::KeyValueStore;

/// Cache key namespaces, each with its own bounds and TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheNamespace {
    /// Parsed intents keyed by normalized query hash
    Intent,
    /// Per-part lookups keyed by normalized part number
    Parts,
    /// Full search responses
    Search,
}

impl CacheNamespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheNamespace::Intent => "intent",
            CacheNamespace::Parts => "parts",
            CacheNamespace::Search => "search",
        }
    }

    fn capacity(&self) -> usize {
        match self {
            CacheNamespace::Intent => bounds::INTENT_CAPACITY,
            CacheNamespace::Parts => bounds::PARTS_CAPACITY,
            CacheNamespace::Search => bounds::RESPONSE_CAPACITY,
        }
    }

    fn ttl(&self) -> Duration {
        match self {
            CacheNamespace::Intent => Duration::from_secs(bounds::INTENT_TTL_SECS),
            CacheNamespace::Parts => Duration::from_secs(bounds::PARTS_TTL_SECS),
            CacheNamespace::Search => Duration::from_secs(bounds::RESPONSE_TTL_SECS),
        }
    }
}

/// MD5 truncated to 16 hex characters over the canonical key payload
pub fn hash_key(payload: &str) -> String {
    let digest = format!("{:x}", md5::compute(payload.as_bytes()));
    digest[..16].to_string()
}

/// Stable JSON encoding for cache-key payloads: round-tripping through
/// `serde_json::Value` sorts object keys, so the rendering is independent of
/// struct field order.
pub fn canonical_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(v) => v.to_string(),
        Err(_) => String::new(),
    }
}

struct L1Entry {
    value: String,
    expires_at: Instant,
}

struct Tier {
    entries: Mutex<LruCache<String, L1Entry>>,
    ttl: Duration,
}

impl Tier {
    fn new(namespace: CacheNamespace) -> Self {
        let capacity = NonZeroUsize::new(namespace.capacity().max(1)).expect("nonzero capacity");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: namespace.ttl(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                // Lazy TTL expiry
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: String, value: String) {
        let entry = L1Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().put(key, entry);
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Counters for the stats report
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub l2_errors: u64,
    pub intent_entries: usize,
    pub parts_entries: usize,
    pub search_entries: usize,
}

/// The process-wide two-tier cache
pub struct TieredCache {
    enabled: bool,
    intents: Tier,
    parts: Tier,
    searches: Tier,
    l2: Arc<dyn KeyValueStore>,
    l1_hits: AtomicU64,
    l1_misses: AtomicU64,
    l2_hits: AtomicU64,
    l2_misses: AtomicU64,
    l2_errors: AtomicU64,
}

impl TieredCache {
    /// The L2 tier is a non-optional interface; deployments without a
    /// distributed store pass a `NoopKeyValueStore`.
    pub fn new(enabled: bool, l2: Arc<dyn KeyValueStore>) -> Self {
        Self {
            enabled,
            intents: Tier::new(CacheNamespace::Intent),
            parts: Tier::new(CacheNamespace::Parts),
            searches: Tier::new(CacheNamespace::Search),
            l2,
            l1_hits: AtomicU64::new(0),
            l1_misses: AtomicU64::new(0),
            l2_hits: AtomicU64::new(0),
            l2_misses: AtomicU64::new(0),
            l2_errors: AtomicU64::new(0),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn tier(&self, namespace: CacheNamespace) -> &Tier {
        match namespace {
            CacheNamespace::Intent => &self.intents,
            CacheNamespace::Parts => &self.parts,
            CacheNamespace::Search => &self.searches,
        }
    }

    /// Full key for a namespace and payload. Intent and search payloads are
    /// hashed; part keys stay readable (`parts:<UPPER-NORMALIZED>`).
    pub fn key(namespace: CacheNamespace, payload: &str) -> String {
        match namespace {
            CacheNamespace::Parts => format!("{}:{}", namespace.prefix(), payload),
            _ => format!("{}:{}", namespace.prefix(), hash_key(payload)),
        }
    }

    pub async fn get(&self, namespace: CacheNamespace, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        if let Some(value) = self.tier(namespace).get(key) {
            self.l1_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "L1 cache hit");
            return Some(value);
        }
        self.l1_misses.fetch_add(1, Ordering::Relaxed);

        match self.l2.get(key).await {
            Ok(Some(value)) => {
                self.l2_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "L2 cache hit, promoting to L1");
                self.tier(namespace).put(key.to_string(), value.clone());
                Some(value)
            }
            Ok(None) => {
                self.l2_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(err) => {
                self.l2_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key, error = %err, "L2 cache read failed, degrading to L1-only");
                None
            }
        }
    }

    pub async fn set(&self, namespace: CacheNamespace, key: &str, value: String) {
        if !self.enabled {
            return;
        }
        self.set_with_ttl(namespace, key, value, namespace.ttl()).await;
    }

    pub async fn set_with_ttl(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: String,
        ttl: Duration,
    ) {
        if !self.enabled {
            return;
        }
        self.tier(namespace).put(key.to_string(), value.clone());

        if let Err(err) = self.l2.setex(key, ttl.as_secs().max(1), &value).await {
            self.l2_errors.fetch_add(1, Ordering::Relaxed);
            warn!(key, error = %err, "L2 cache write failed, value kept in L1 only");
        }
    }

    /// Typed read
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        namespace: CacheNamespace,
        key: &str,
    ) -> Option<T> {
        let raw = self.get(namespace, key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "cached value failed to decode, ignoring");
                None
            }
        }
    }

    /// Typed write
    pub async fn set_json<T: Serialize>(&self, namespace: CacheNamespace, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(namespace, key, raw).await,
            Err(err) => warn!(key, error = %err, "value failed to encode, not cached"),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l1_misses: self.l1_misses.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            l2_misses: self.l2_misses.load(Ordering::Relaxed),
            l2_errors: self.l2_errors.load(Ordering::Relaxed),
            intent_entries: self.intents.len(),
            parts_entries: self.parts.len(),
            search_entries: self.searches.len(),
        }
    }
}
