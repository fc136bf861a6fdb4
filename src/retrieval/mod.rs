//! Retrieval layer.
//!
//! Whole-object read access to stored tiers by identity, on top of any
//! [`ImageStore`](crate::store::ImageStore).
//!
//! # Components
//!
//! - [`RetrievalService`]: list, thumbnail and full-resolution lookups
//! - [`TierCache`]: LRU cache of tier payloads with size-based eviction
//! - [`TierFetcher`]: what a gallery client needs from the server side
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use progressive_gallery::retrieval::RetrievalService;
//! use progressive_gallery::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = RetrievalService::new(Arc::new(MemoryStore::new()));
//!     assert!(service.list().await.unwrap().is_empty());
//!
//!     // Malformed identifiers are rejected before touching the store
//!     assert!(service.thumbnail("not-a-uuid").await.is_err());
//! }
//! ```

mod cache;
mod service;

pub use cache::{TierCache, TierCacheKey, DEFAULT_TIER_CACHE_CAPACITY};
pub use service::{parse_id, RetrievalService, TierFetcher, TierResponse};
