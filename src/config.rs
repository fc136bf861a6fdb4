//! Configuration management for the gallery server.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `GALLERY_` prefix:
//!
//! - `GALLERY_HOST` - Server bind address (default: 0.0.0.0)
//! - `GALLERY_PORT` - Server port (default: 5000)
//! - `GALLERY_DATA_DIR` - Directory for persisted images (default: in-memory)
//! - `GALLERY_THUMBNAIL_SIZE` - Thumbnail edge in pixels (default: 16)
//! - `GALLERY_THUMBNAIL_QUALITY` - Thumbnail JPEG quality (default: 40)
//! - `GALLERY_FULL_QUALITY` - Full-resolution JPEG quality (default: 85)
//! - `GALLERY_MAX_PIXELS` - Largest accepted decoded image (default: 64 MP)
//! - `GALLERY_WORKERS` - Concurrent transcodes (default: CPU count)
//! - `GALLERY_QUEUE_DEPTH` - Imports allowed to wait for a worker (default: 32)
//! - `GALLERY_MAX_UPLOAD_BYTES` - Request body limit (default: 50MB)
//! - `GALLERY_CACHE_BYTES` - Tier cache capacity (default: 64MB)
//! - `GALLERY_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)
//! - `GALLERY_CORS_ORIGINS` - Allowed origins, comma-separated (default: any)

use std::path::PathBuf;

use clap::Parser;

use crate::retrieval::DEFAULT_TIER_CACHE_CAPACITY;
use crate::transcode::{
    default_workers, is_valid_quality, TranscodeOptions, DEFAULT_FULL_QUALITY, DEFAULT_MAX_PIXELS,
    DEFAULT_QUEUE_DEPTH, DEFAULT_THUMBNAIL_QUALITY, DEFAULT_THUMBNAIL_SIZE,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default upload limit: 50MB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Default HTTP cache max-age in seconds (1 day). Tiers never change.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86_400;

/// Largest accepted thumbnail edge.
pub const MAX_THUMBNAIL_SIZE: u32 = 256;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Progressive Gallery - image import and two-tier retrieval server.
///
/// Imports uploaded images, stores a full-resolution and a tiny preview
/// encoding of each, and serves them for progressive display.
#[derive(Parser, Debug, Clone)]
#[command(name = "progressive-gallery")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GALLERY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GALLERY_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding persisted images.
    ///
    /// If not specified, images are kept in memory and lost on restart.
    #[arg(long, env = "GALLERY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    // =========================================================================
    // Transcode Configuration
    // =========================================================================
    /// Edge length of the square preview thumbnail, in pixels.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE, env = "GALLERY_THUMBNAIL_SIZE")]
    pub thumbnail_size: u32,

    /// JPEG quality of the preview tier (1-100).
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_QUALITY, env = "GALLERY_THUMBNAIL_QUALITY")]
    pub thumbnail_quality: u8,

    /// JPEG quality of the full-resolution tier (1-100).
    #[arg(long, default_value_t = DEFAULT_FULL_QUALITY, env = "GALLERY_FULL_QUALITY")]
    pub full_quality: u8,

    /// Largest accepted decoded image, in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_PIXELS, env = "GALLERY_MAX_PIXELS")]
    pub max_pixels: u64,

    /// Number of images transcoded concurrently.
    #[arg(long, default_value_t = default_workers(), env = "GALLERY_WORKERS")]
    pub workers: usize,

    /// Import requests allowed to wait for a worker before new ones get 503.
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH, env = "GALLERY_QUEUE_DEPTH")]
    pub queue_depth: usize,

    /// Maximum accepted request body, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "GALLERY_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Capacity of the in-process tier cache, in bytes.
    #[arg(long, default_value_t = DEFAULT_TIER_CACHE_CAPACITY, env = "GALLERY_CACHE_BYTES")]
    pub cache_bytes: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "GALLERY_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "GALLERY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.thumbnail_size == 0 || self.thumbnail_size > MAX_THUMBNAIL_SIZE {
            return Err(format!(
                "thumbnail_size must be between 1 and {}",
                MAX_THUMBNAIL_SIZE
            ));
        }

        if !is_valid_quality(self.thumbnail_quality) {
            return Err("thumbnail_quality must be between 1 and 100".to_string());
        }
        if !is_valid_quality(self.full_quality) {
            return Err("full_quality must be between 1 and 100".to_string());
        }
        // Preview tier must stay cheaper than the full tier
        if self.thumbnail_quality >= self.full_quality {
            return Err("thumbnail_quality must be lower than full_quality".to_string());
        }

        if self.max_pixels == 0 {
            return Err("max_pixels must be greater than 0".to_string());
        }
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err("data_dir must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pixel budget in binary megapixels, as shown in logs.
    pub fn max_megapixels(&self) -> u64 {
        self.max_pixels / (1024 * 1024)
    }

    /// Transcoder settings derived from this configuration.
    pub fn transcode_options(&self) -> TranscodeOptions {
        TranscodeOptions {
            thumbnail_size: self.thumbnail_size,
            thumbnail_quality: self.thumbnail_quality,
            full_quality: self.full_quality,
            max_pixels: self.max_pixels,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
