//! Payload cache for stored tiers.
//!
//! Records never change after creation, so an entry can live until it is
//! evicted for space; there is no invalidation path.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total payload size in bytes and evicts
//! least-recently-used entries when the capacity is exceeded. Payloads larger
//! than the whole capacity are not cached at all.

use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::store::{ImageId, StoredTier, Tier};

/// Default cache capacity: 64MB
pub const DEFAULT_TIER_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Cache key: one tier of one record.
pub type TierCacheKey = (ImageId, Tier);

struct CacheInner {
    entries: LruCache<TierCacheKey, StoredTier>,
    current_size: usize,
}

/// LRU cache of tier payloads with a byte-size budget.
///
/// Thread-safe; share it behind the owning service.
pub struct TierCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
}

impl TierCache {
    /// Create a cache with the default capacity (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TIER_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_size` payload bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with a byte budget and an entry-count bound.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(max_entries),
                current_size: 0,
            }),
            max_size,
        }
    }

    /// Look up a payload, marking it recently used.
    pub async fn get(&self, id: ImageId, tier: Tier) -> Option<StoredTier> {
        let mut inner = self.inner.lock().await;
        inner.entries.get(&(id, tier)).cloned()
    }

    /// Check presence without touching LRU order.
    pub async fn contains(&self, id: ImageId, tier: Tier) -> bool {
        self.inner.lock().await.entries.contains(&(id, tier))
    }

    /// Insert a payload, evicting least-recently-used entries past capacity.
    pub async fn put(&self, id: ImageId, tier: Tier, payload: StoredTier) {
        let size = payload.bytes.len();
        if size > self.max_size {
            return;
        }

        let mut inner = self.inner.lock().await;

        if let Some(old) = inner.entries.peek(&(id, tier)) {
            inner.current_size = inner.current_size.saturating_sub(old.bytes.len());
        }

        // push() hands back whatever the entry-count bound pushed out
        if let Some((key, evicted)) = inner.entries.push((id, tier), payload) {
            if key != (id, tier) {
                inner.current_size = inner.current_size.saturating_sub(evicted.bytes.len());
            }
        }
        inner.current_size += size;

        while inner.current_size > self.max_size {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.current_size = inner.current_size.saturating_sub(evicted.bytes.len());
                }
                None => break,
            }
        }
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.current_size = 0;
    }

    /// Number of cached payloads.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Total cached payload bytes.
    pub async fn size(&self) -> usize {
        self.inner.lock().await.current_size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TierCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
