//! Tiered image store.
//!
//! Every uploaded image is persisted as exactly one [`ImageRecord`] holding both
//! of its encodings (the thumbnail tier and the full-resolution tier) plus the
//! metadata needed to serve them. The store is the only component that assigns
//! identifiers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     ImportService / RetrievalService    │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           ImageStore Trait              │
//! │  create · list_metadata · get_tier      │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   MemoryStore   │    │      FsStore        │
//! │  (in-process)   │    │ (directory/record)  │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! # Atomic creation
//!
//! `create` takes both encodings at once. A record is either absent or complete:
//! there is no intermediate state in which only one tier is readable.

mod fs;
mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

pub use fs::FsStore;
pub use memory::MemoryStore;

// =============================================================================
// Identity
// =============================================================================

/// Opaque, store-assigned image identifier.
///
/// Rendered as a hyphenated UUID in URLs and JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Generate a fresh random identifier. Only stores call this.
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// =============================================================================
// Tier
// =============================================================================

/// One of the two stored resolutions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Small fixed-size preview
    Thumbnail,
    /// Full-resolution transcode
    FullRes,
}

impl Tier {
    /// Both tiers, thumbnail first.
    pub const ALL: [Tier; 2] = [Tier::Thumbnail, Tier::FullRes];

    /// Stable lowercase name used in logs and error payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Thumbnail => "thumbnail",
            Tier::FullRes => "full",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Records
// =============================================================================

/// A complete, stored image.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: ImageId,

    /// Creation counter; listing order
    pub sequence: u64,

    /// Client-supplied name, informational only
    pub filename: String,

    /// MIME type shared by both tiers
    pub content_type: String,

    pub full_res: Bytes,
    pub thumbnail: Bytes,
}

impl ImageRecord {
    /// Payload for the given tier.
    pub fn tier(&self, tier: Tier) -> &Bytes {
        match tier {
            Tier::Thumbnail => &self.thumbnail,
            Tier::FullRes => &self.full_res,
        }
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            id: self.id,
            filename: self.filename.clone(),
        }
    }
}

/// Input to [`ImageStore::create`]: both encodings plus metadata.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub full_res: Bytes,
    pub thumbnail: Bytes,
    pub content_type: String,
    pub filename: String,
}

impl NewImage {
    /// Reject payloads that would produce a single-tier record.
    pub(crate) fn check_complete(&self) -> Result<(), StoreError> {
        if self.thumbnail.is_empty() {
            return Err(StoreError::Incomplete {
                tier: Tier::Thumbnail,
            });
        }
        if self.full_res.is_empty() {
            return Err(StoreError::Incomplete {
                tier: Tier::FullRes,
            });
        }
        Ok(())
    }
}

/// Metadata-only listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub id: ImageId,
    pub filename: String,
}

/// Bytes of one tier with their content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTier {
    pub bytes: Bytes,
    pub content_type: Arc<str>,
}

// =============================================================================
// ImageStore Trait
// =============================================================================

/// Persistence backend for image records.
///
/// Implementations own identifier assignment and must make `create` atomic:
/// once it returns, both tiers are readable; before it returns, neither is.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist a new record and return its identifier.
    async fn create(&self, image: NewImage) -> Result<ImageId, StoreError>;

    /// All records, metadata only, in creation order.
    async fn list_metadata(&self) -> Result<Vec<ImageSummary>, StoreError>;

    /// Read one tier. `Ok(None)` when no record has this identifier.
    async fn get_tier(&self, id: ImageId, tier: Tier) -> Result<Option<StoredTier>, StoreError>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize, StoreError>;
}

#[async_trait]
impl<S: ImageStore + ?Sized> ImageStore for Arc<S> {
    async fn create(&self, image: NewImage) -> Result<ImageId, StoreError> {
        (**self).create(image).await
    }

    async fn list_metadata(&self) -> Result<Vec<ImageSummary>, StoreError> {
        (**self).list_metadata().await
    }

    async fn get_tier(&self, id: ImageId, tier: Tier) -> Result<Option<StoredTier>, StoreError> {
        (**self).get_tier(id, tier).await
    }

    async fn len(&self) -> Result<usize, StoreError> {
        (**self).len().await
    }
}
