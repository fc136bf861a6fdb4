use thiserror::Error;

use crate::store::{ImageId, Tier};

/// Errors raised while transcoding an uploaded image.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    /// The upload contained no bytes
    #[error("Empty image payload")]
    Empty,

    /// Input could not be decoded (corrupt or unsupported format)
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Decoded image exceeds the configured pixel budget
    #[error("Image too large: {width}x{height} exceeds {max_pixels} pixels")]
    TooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },

    /// Re-encoding into the target format failed
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// The blocking worker running the transcode panicked or was cancelled
    #[error("Transcode worker failed: {message}")]
    Worker { message: String },
}

/// Errors from the persistence layer.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Filesystem or driver I/O failure
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Refused to persist a record missing one of its tiers
    #[error("Refusing to store a record without its {tier} payload")]
    Incomplete { tier: Tier },

    /// A stored record could not be read back consistently
    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: ImageId, message: String },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Top-level error for the import and retrieval API.
///
/// Each variant maps onto one HTTP status in `server::handlers`.
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    /// Missing file, malformed identifier or unreadable request body (400)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Well-formed identifier with no matching record (404)
    #[error("Image not found: {id} ({tier})")]
    NotFound { id: ImageId, tier: Tier },

    /// Transcode failure for one file of a batch (500)
    #[error("Processing failed for file {index} ({filename}): {source}")]
    Processing {
        index: usize,
        filename: String,
        #[source]
        source: ProcessingError,
    },

    /// A batch task failed outside any single file's transcode (500)
    #[error("Transcode batch task failed: {message}")]
    Worker { message: String },

    /// Persistence failure (500)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Upload exceeded the configured body limit (413)
    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String },

    /// Transcode pool is saturated (503)
    #[error("Transcode queue full: {in_flight} jobs admitted")]
    Overloaded { in_flight: usize },
}

impl ImportError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        ImportError::Validation {
            message: message.into(),
        }
    }
}
