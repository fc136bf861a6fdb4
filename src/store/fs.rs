//! Filesystem-backed image store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/
//!   <id>/
//!     meta.json     filename, content type, sequence, payload lengths
//!     thumb.bin     thumbnail tier
//!     full.bin      full-resolution tier
//!   .staging-<id>/  record being written (never read)
//! ```
//!
//! A record is staged in full and then renamed into place. The rename is the
//! commit point: readers resolve `<root>/<id>` and either find nothing or a
//! directory with both tiers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::StoreError;

use super::{ImageId, ImageStore, ImageSummary, NewImage, StoredTier, Tier};

const META_FILE: &str = "meta.json";
const STAGING_PREFIX: &str = ".staging-";

fn tier_file(tier: Tier) -> &'static str {
    match tier {
        Tier::Thumbnail => "thumb.bin",
        Tier::FullRes => "full.bin",
    }
}

/// Sidecar metadata persisted next to the tier payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordMeta {
    id: ImageId,
    sequence: u64,
    filename: String,
    content_type: String,
    thumbnail_len: u64,
    full_res_len: u64,
}

impl RecordMeta {
    fn expected_len(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Thumbnail => self.thumbnail_len,
            Tier::FullRes => self.full_res_len,
        }
    }
}

/// Image store keeping one directory per record.
pub struct FsStore {
    root: PathBuf,
    next_sequence: AtomicU64,
}

impl FsStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Leftover staging directories from an interrupted `create` are removed,
    /// and the sequence counter resumes after the highest stored record.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let mut max_sequence: Option<u64> = None;
        let mut records = 0usize;
        let mut entries = tokio::fs::read_dir(&root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name.starts_with(STAGING_PREFIX) {
                warn!(path = %entry.path().display(), "Removing incomplete staged record");
                tokio::fs::remove_dir_all(entry.path()).await?;
                continue;
            }

            let Ok(id) = name.parse::<ImageId>() else {
                continue;
            };

            let Some(meta) = read_meta_or_skip(&entry.path(), id).await else {
                continue;
            };
            max_sequence = Some(max_sequence.map_or(meta.sequence, |m| m.max(meta.sequence)));
            records += 1;
        }

        info!(root = %root.display(), records, "Opened filesystem image store");

        Ok(Self {
            root,
            next_sequence: AtomicU64::new(max_sequence.map_or(0, |m| m + 1)),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_dir(&self, id: ImageId) -> PathBuf {
        self.root.join(id.to_string())
    }

    async fn read_all_meta(&self) -> Result<Vec<RecordMeta>, StoreError> {
        let mut metas = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Ok(id) = name.to_string_lossy().parse::<ImageId>() else {
                continue;
            };
            if let Some(meta) = read_meta_or_skip(&entry.path(), id).await {
                metas.push(meta);
            }
        }

        metas.sort_by_key(|meta| meta.sequence);
        Ok(metas)
    }
}

async fn read_meta(dir: &Path, id: ImageId) -> Result<RecordMeta, StoreError> {
    let raw = tokio::fs::read(dir.join(META_FILE)).await?;
    let meta: RecordMeta = serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
        id,
        message: format!("unreadable metadata: {}", e),
    })?;

    if meta.id != id {
        return Err(StoreError::Corrupt {
            id,
            message: format!("metadata names a different record ({})", meta.id),
        });
    }

    Ok(meta)
}

/// Read a record's metadata for listing. An unreadable record is logged and
/// left out so it cannot hide the rest of the store.
async fn read_meta_or_skip(dir: &Path, id: ImageId) -> Option<RecordMeta> {
    match read_meta(dir, id).await {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(image_id = %id, error = %e, "Skipping unreadable image record");
            None
        }
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl ImageStore for FsStore {
    async fn create(&self, image: NewImage) -> Result<ImageId, StoreError> {
        image.check_complete()?;

        let mut id = ImageId::random();
        while tokio::fs::try_exists(self.record_dir(id)).await? {
            id = ImageId::random();
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let meta = RecordMeta {
            id,
            sequence,
            filename: image.filename,
            content_type: image.content_type,
            thumbnail_len: image.thumbnail.len() as u64,
            full_res_len: image.full_res.len() as u64,
        };
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(|e| StoreError::Corrupt {
            id,
            message: format!("cannot serialize metadata: {}", e),
        })?;

        let staging = self.root.join(format!("{}{}", STAGING_PREFIX, id));
        tokio::fs::create_dir(&staging).await?;

        let staged = async {
            write_synced(&staging.join(tier_file(Tier::Thumbnail)), &image.thumbnail).await?;
            write_synced(&staging.join(tier_file(Tier::FullRes)), &image.full_res).await?;
            write_synced(&staging.join(META_FILE), &meta_json).await?;
            tokio::fs::rename(&staging, self.record_dir(id)).await?;
            Ok::<(), StoreError>(())
        }
        .await;

        if let Err(err) = staged {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                warn!(image_id = %id, error = %cleanup, "Failed to clean up staged record");
            }
            return Err(err);
        }

        debug!(image_id = %id, sequence, "Stored image record");
        Ok(id)
    }

    async fn list_metadata(&self) -> Result<Vec<ImageSummary>, StoreError> {
        Ok(self
            .read_all_meta()
            .await?
            .into_iter()
            .map(|meta| ImageSummary {
                id: meta.id,
                filename: meta.filename,
            })
            .collect())
    }

    async fn get_tier(&self, id: ImageId, tier: Tier) -> Result<Option<StoredTier>, StoreError> {
        let dir = self.record_dir(id);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(None);
        }

        let meta = read_meta(&dir, id).await?;
        let bytes = tokio::fs::read(dir.join(tier_file(tier))).await?;

        if bytes.len() as u64 != meta.expected_len(tier) {
            return Err(StoreError::Corrupt {
                id,
                message: format!(
                    "{} payload is {} bytes, metadata says {}",
                    tier,
                    bytes.len(),
                    meta.expected_len(tier)
                ),
            });
        }

        Ok(Some(StoredTier {
            bytes: Bytes::from(bytes),
            content_type: Arc::from(meta.content_type),
        }))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read_all_meta().await?.len())
    }
}
