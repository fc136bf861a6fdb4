//! Two-tier image transcoder.
//!
//! Decodes an uploaded image once and derives both stored encodings from it:
//!
//! - **Full resolution**: re-encoded as JPEG at the source dimensions.
//! - **Thumbnail**: downscaled (never cropped) to a fixed square and encoded at
//!   a lower JPEG quality.
//!
//! # Design Decisions
//!
//! - **Format sniffing**: the input format is guessed from the bytes, never from
//!   the client-supplied filename.
//! - **Dimension probe first**: oversized inputs are rejected from their header
//!   before any pixel buffer is allocated.
//! - **Alpha is flattened**: JPEG has no alpha channel, so both tiers are
//!   encoded from an RGB8 conversion.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use crate::error::ProcessingError;

/// MIME type of both stored tiers.
pub const TARGET_CONTENT_TYPE: &str = "image/jpeg";

/// Default thumbnail edge length in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 16;

/// Default JPEG quality for thumbnails.
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 40;

/// Default JPEG quality for full-resolution encodings.
pub const DEFAULT_FULL_QUALITY: u8 = 85;

/// Default decoded pixel budget (64 megapixels).
pub const DEFAULT_MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Options
// =============================================================================

/// Tunables for [`Transcoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    /// Edge length of the square thumbnail
    pub thumbnail_size: u32,

    /// JPEG quality for the thumbnail tier
    pub thumbnail_quality: u8,

    /// JPEG quality for the full-resolution tier
    pub full_quality: u8,

    /// Largest accepted `width * height` of the decoded input
    pub max_pixels: u64,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            thumbnail_quality: DEFAULT_THUMBNAIL_QUALITY,
            full_quality: DEFAULT_FULL_QUALITY,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Both derived encodings of one source image.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub full_res: Bytes,
    pub thumbnail: Bytes,

    /// Shared MIME type of both encodings
    pub content_type: &'static str,

    /// Source (and full-resolution) width
    pub width: u32,

    /// Source (and full-resolution) height
    pub height: u32,
}

// =============================================================================
// Transcoder
// =============================================================================

/// Stateless image transcoder.
///
/// # Example
///
/// ```ignore
/// use progressive_gallery::transcode::{Transcoder, TranscodeOptions};
///
/// let transcoder = Transcoder::new(TranscodeOptions::default());
/// let out = transcoder.transcode(&png_bytes)?;
/// assert_eq!(out.content_type, "image/jpeg");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Transcoder {
    options: TranscodeOptions,
}

impl Transcoder {
    pub fn new(options: TranscodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// Decode `source` and produce the full-resolution and thumbnail encodings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `source` is empty
    /// - the format is not recognized or the data is corrupt
    /// - the image exceeds the pixel budget
    /// - JPEG encoding fails
    ///
    /// On error neither encoding is produced.
    pub fn transcode(&self, source: &[u8]) -> Result<Transcoded, ProcessingError> {
        if source.is_empty() {
            return Err(ProcessingError::Empty);
        }

        let (width, height) = self.dimensions(source)?;
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.options.max_pixels {
            return Err(ProcessingError::TooLarge {
                width,
                height,
                max_pixels: self.options.max_pixels,
            });
        }

        let img = guessed_reader(source)?
            .decode()
            .map_err(|e| ProcessingError::Decode {
                message: e.to_string(),
            })?;

        let full_res = encode_jpeg(&img, self.options.full_quality)?;

        let size = self.options.thumbnail_size;
        let thumbnail_img = img.resize_exact(size, size, FilterType::Triangle);
        let thumbnail = encode_jpeg(&thumbnail_img, self.options.thumbnail_quality)?;

        Ok(Transcoded {
            full_res,
            thumbnail,
            content_type: TARGET_CONTENT_TYPE,
            width,
            height,
        })
    }

    /// Read image dimensions from the header without decoding pixels.
    pub fn dimensions(&self, source: &[u8]) -> Result<(u32, u32), ProcessingError> {
        guessed_reader(source)?
            .into_dimensions()
            .map_err(|e| ProcessingError::Decode {
                message: e.to_string(),
            })
    }
}

fn guessed_reader(source: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ProcessingError> {
    let reader = ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| ProcessingError::Decode {
            message: e.to_string(),
        })?;

    if reader.format().is_none() {
        return Err(ProcessingError::Decode {
            message: "unrecognized image format".to_string(),
        });
    }

    Ok(reader)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, ProcessingError> {
    let rgb = img.to_rgb8();
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, clamp_quality(quality));

    encoder
        .encode_image(&rgb)
        .map_err(|e| ProcessingError::Encode {
            message: e.to_string(),
        })?;

    Ok(Bytes::from(output))
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to the valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
