//! Transcode layer.
//!
//! Turns one uploaded image into the two stored tiers and bounds how many of
//! those CPU-heavy jobs run at once.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              ImportService              │
//! └────────────────────┬────────────────────┘
//!                      │ Vec<SourceImage>
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             TranscodePool               │
//! │  admission queue → worker permits →     │
//! │  spawn_blocking(Transcoder::transcode)  │
//! └────────────────────┬────────────────────┘
//!                      │ Vec<Transcoded>
//!                      ▼
//!          (full_res JPEG, thumbnail JPEG)
//! ```
//!
//! # Components
//!
//! - [`Transcoder`]: decodes any supported input and encodes both tiers
//! - [`TranscodeOptions`]: thumbnail size, per-tier JPEG quality, pixel budget
//! - [`TranscodePool`]: bounded worker pool with backpressure

mod encoder;
mod pool;

pub use encoder::{
    clamp_quality, is_valid_quality, Transcoded, TranscodeOptions, Transcoder,
    DEFAULT_FULL_QUALITY, DEFAULT_MAX_PIXELS, DEFAULT_THUMBNAIL_QUALITY, DEFAULT_THUMBNAIL_SIZE,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY, TARGET_CONTENT_TYPE,
};
pub use pool::{default_workers, SourceImage, TranscodePool, DEFAULT_QUEUE_DEPTH};
