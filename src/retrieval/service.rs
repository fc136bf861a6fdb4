//! Retrieval Service for read access to stored tiers.
//!
//! The RetrievalService is the read side of the API. It:
//! - Validates textual identifiers
//! - Serves payloads from the tier cache when possible
//! - Falls back to the store and caches the result
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    RetrievalService                     │
//! │   parse_id() → TierCache → ImageStore::get_tier()       │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error};

use crate::error::ImportError;
use crate::store::{ImageId, ImageStore, ImageSummary, Tier};

use super::cache::TierCache;

/// Response from a tier fetch.
#[derive(Debug, Clone)]
pub struct TierResponse {
    pub id: ImageId,
    pub tier: Tier,

    /// Exact stored bytes
    pub data: Bytes,

    /// Stored MIME type
    pub content_type: Arc<str>,

    /// Whether the payload came from the cache
    pub cache_hit: bool,
}

/// Parse a textual image identifier.
///
/// Malformed input is a validation error, distinct from a missing record.
pub fn parse_id(raw: &str) -> Result<ImageId, ImportError> {
    raw.parse::<ImageId>()
        .map_err(|_| ImportError::validation(format!("Invalid image ID: {}", raw)))
}

/// Read-only access to stored images.
///
/// # Type Parameters
///
/// * `S` - The store backend
pub struct RetrievalService<S: ImageStore> {
    store: Arc<S>,
    cache: TierCache,
}

impl<S: ImageStore> RetrievalService<S> {
    /// Create a service with the default cache capacity.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cache: TierCache::new(),
        }
    }

    /// Create a service with a cache of `cache_capacity` bytes.
    pub fn with_cache_capacity(store: Arc<S>, cache_capacity: usize) -> Self {
        Self {
            store,
            cache: TierCache::with_capacity(cache_capacity),
        }
    }

    /// Metadata for every stored image, in creation order.
    pub async fn list(&self) -> Result<Vec<ImageSummary>, ImportError> {
        self.store.list_metadata().await.map_err(|e| {
            error!(operation = "list", error = %e, "Failed to list images");
            ImportError::from(e)
        })
    }

    /// Thumbnail bytes by textual id.
    pub async fn thumbnail(&self, raw_id: &str) -> Result<TierResponse, ImportError> {
        self.get(parse_id(raw_id)?, Tier::Thumbnail).await
    }

    /// Full-resolution bytes by textual id.
    pub async fn full_res(&self, raw_id: &str) -> Result<TierResponse, ImportError> {
        self.get(parse_id(raw_id)?, Tier::FullRes).await
    }

    /// Fetch one tier of one record.
    pub async fn get(&self, id: ImageId, tier: Tier) -> Result<TierResponse, ImportError> {
        if let Some(cached) = self.cache.get(id, tier).await {
            return Ok(TierResponse {
                id,
                tier,
                data: cached.bytes,
                content_type: cached.content_type,
                cache_hit: true,
            });
        }

        let stored = self
            .store
            .get_tier(id, tier)
            .await
            .map_err(|e| {
                error!(image_id = %id, tier = %tier, error = %e, "Failed to read tier");
                ImportError::from(e)
            })?
            .ok_or(ImportError::NotFound { id, tier })?;

        debug!(image_id = %id, tier = %tier, bytes = stored.bytes.len(), "Loaded tier from store");
        self.cache.put(id, tier, stored.clone()).await;

        Ok(TierResponse {
            id,
            tier,
            data: stored.bytes,
            content_type: stored.content_type,
            cache_hit: false,
        })
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<usize, ImportError> {
        Ok(self.store.len().await?)
    }

    /// Cache statistics: `(current_size, capacity, entry_count)`.
    pub async fn cache_stats(&self) -> (usize, usize, usize) {
        (
            self.cache.size().await,
            self.cache.capacity(),
            self.cache.len().await,
        )
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

// =============================================================================
// TierFetcher
// =============================================================================

/// Source of image listings and tier payloads for a gallery client.
///
/// Implemented in-process by [`RetrievalService`]; an HTTP client would
/// implement it against the `/api/import` routes.
#[async_trait]
pub trait TierFetcher: Send + Sync + 'static {
    async fn list(&self) -> Result<Vec<ImageSummary>, ImportError>;

    async fn fetch(&self, id: ImageId, tier: Tier) -> Result<Bytes, ImportError>;
}

#[async_trait]
impl<S: ImageStore + 'static> TierFetcher for RetrievalService<S> {
    async fn list(&self) -> Result<Vec<ImageSummary>, ImportError> {
        RetrievalService::list(self).await
    }

    async fn fetch(&self, id: ImageId, tier: Tier) -> Result<Bytes, ImportError> {
        Ok(self.get(id, tier).await?.data)
    }
}
