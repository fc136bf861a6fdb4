//! In-process image store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;

use super::{ImageId, ImageRecord, ImageStore, ImageSummary, NewImage, StoredTier, Tier};

/// Image store backed by process memory.
///
/// Records are inserted whole under a single write-lock section, so readers
/// never observe a record with only one tier. Nothing is persisted across
/// restarts; use [`FsStore`](super::FsStore) for that.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<ImageId, Arc<ImageRecord>>,
    /// Identifiers in creation order
    order: Vec<ImageId>,
    next_sequence: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full record lookup, used by tests and diagnostics.
    pub async fn get(&self, id: ImageId) -> Option<Arc<ImageRecord>> {
        self.inner.read().await.records.get(&id).cloned()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn create(&self, image: NewImage) -> Result<ImageId, StoreError> {
        image.check_complete()?;

        let mut inner = self.inner.write().await;

        let mut id = ImageId::random();
        while inner.records.contains_key(&id) {
            id = ImageId::random();
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        let record = ImageRecord {
            id,
            sequence,
            filename: image.filename,
            content_type: image.content_type,
            full_res: image.full_res,
            thumbnail: image.thumbnail,
        };

        inner.records.insert(id, Arc::new(record));
        inner.order.push(id);

        debug!(image_id = %id, sequence, "Stored image record");
        Ok(id)
    }

    async fn list_metadata(&self) -> Result<Vec<ImageSummary>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .map(|record| record.summary())
            .collect())
    }

    async fn get_tier(&self, id: ImageId, tier: Tier) -> Result<Option<StoredTier>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(&id).map(|record| StoredTier {
            bytes: record.tier(tier).clone(),
            content_type: Arc::from(record.content_type.as_str()),
        }))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.records.len())
    }
}
