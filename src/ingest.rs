//! Batch image import.
//!
//! An import request carries one or more files. The whole batch is transcoded
//! first; only when every file produced both tiers are the records persisted,
//! one atomic `create` per file. A corrupt file therefore rejects the batch
//! without leaving any of its siblings behind.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::error::ImportError;
use crate::store::{ImageId, ImageStore, NewImage};
use crate::transcode::{SourceImage, TranscodePool};

/// One successfully imported image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedImage {
    pub id: ImageId,
    pub filename: String,
    pub content_type: String,
}

/// Write side of the API: transcode then persist.
pub struct ImportService<S: ImageStore> {
    pool: TranscodePool,
    store: Arc<S>,
}

impl<S: ImageStore> ImportService<S> {
    pub fn new(pool: TranscodePool, store: Arc<S>) -> Self {
        Self { pool, store }
    }

    pub fn pool(&self) -> &TranscodePool {
        &self.pool
    }

    /// Import a batch of files.
    ///
    /// # Errors
    ///
    /// - `Validation` if `files` is empty
    /// - `Overloaded` if the transcode queue is full
    /// - `Processing` if any file fails to transcode (nothing is stored)
    /// - `Worker` if a batch task fails outside any single file
    /// - `Store` if persisting a record fails
    pub async fn import(&self, files: Vec<SourceImage>) -> Result<Vec<ImportedImage>, ImportError> {
        if files.is_empty() {
            return Err(ImportError::validation("No file uploaded"));
        }

        let filenames: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();

        let transcoded = self.pool.transcode_batch(files).await.map_err(|e| {
            if let ImportError::Processing {
                index,
                filename,
                source,
            } = &e
            {
                error!(
                    operation = "import",
                    file_index = index,
                    filename = %filename,
                    error = %source,
                    "Rejecting batch: file failed to transcode"
                );
            }
            e
        })?;

        let mut imported = Vec::with_capacity(transcoded.len());

        for (filename, output) in filenames.into_iter().zip(transcoded) {
            let content_type = output.content_type.to_string();
            let id = self
                .store
                .create(NewImage {
                    full_res: output.full_res,
                    thumbnail: output.thumbnail,
                    content_type: content_type.clone(),
                    filename: filename.clone(),
                })
                .await
                .map_err(|e| {
                    error!(
                        operation = "import",
                        filename = %filename,
                        stored = imported.len(),
                        error = %e,
                        "Failed to persist image"
                    );
                    ImportError::from(e)
                })?;

            info!(
                image_id = %id,
                filename = %filename,
                width = output.width,
                height = output.height,
                "Imported image"
            );

            imported.push(ImportedImage {
                id,
                filename,
                content_type,
            });
        }

        Ok(imported)
    }
}
