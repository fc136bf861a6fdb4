//! Test utilities for integration tests.
//!
//! Fixture images are generated in memory with the `image` crate; multipart
//! bodies are assembled by hand so requests can be driven through
//! `Router::oneshot` without a network client.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tower::ServiceExt;

use progressive_gallery::{
    create_router, ImageId, ImageStore, ImageSummary, ImportError, ImportService, MemoryStore,
    NewImage, RetrievalService, RouterConfig, StoreError, StoredTier, Tier, TierFetcher,
    TranscodePool, Transcoder,
};

// =============================================================================
// Fixture Images
// =============================================================================

/// Encode a gradient image of the given size.
pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode fixture");
    buf
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, ImageFormat::Jpeg)
}

/// A JPEG header followed by garbage.
pub fn corrupt_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xDE, 0xAD, 0xBE, 0xEF]
}

/// Check JPEG SOI/EOI markers.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}

// =============================================================================
// Multipart Bodies
// =============================================================================

pub const BOUNDARY: &str = "gallery-test-boundary";

/// One part of a multipart upload.
pub struct Part {
    pub field: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    pub fn file(field: &str, filename: &str, data: Vec<u8>) -> Self {
        Self {
            field: field.to_string(),
            filename: Some(filename.to_string()),
            data,
        }
    }

    pub fn text(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            filename: None,
            data: value.as_bytes().to_vec(),
        }
    }
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match &part.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.field, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.field)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn import_request(parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/import")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Routers
// =============================================================================

/// Router over an in-memory store, with tracing off.
pub fn test_router() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let router = router_for(Arc::clone(&store), RouterConfig::new().with_tracing(false), 2, 4);
    (router, store)
}

pub fn router_for<S: ImageStore + 'static>(
    store: Arc<S>,
    config: RouterConfig,
    workers: usize,
    queue_depth: usize,
) -> Router {
    let pool = TranscodePool::new(Transcoder::default(), workers, queue_depth);
    create_router(
        RetrievalService::new(Arc::clone(&store)),
        ImportService::new(pool, store),
        config,
    )
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Upload files and return the parsed import response.
pub async fn import_files(router: &Router, files: Vec<(&str, Vec<u8>)>) -> Vec<serde_json::Value> {
    let parts: Vec<Part> = files
        .into_iter()
        .map(|(name, data)| Part::file("images", name, data))
        .collect();
    let response = send(router, import_request(&parts)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response)
        .await
        .as_array()
        .cloned()
        .expect("array response")
}

// =============================================================================
// Stores
// =============================================================================

/// Store whose writes always fail; reads behave like an empty store.
pub struct FailingStore;

#[async_trait]
impl ImageStore for FailingStore {
    async fn create(&self, _image: NewImage) -> Result<ImageId, StoreError> {
        Err(StoreError::Io("disk full at /var/lib/gallery".to_string()))
    }

    async fn list_metadata(&self) -> Result<Vec<ImageSummary>, StoreError> {
        Err(StoreError::Io("listing unavailable".to_string()))
    }

    async fn get_tier(&self, _id: ImageId, _tier: Tier) -> Result<Option<StoredTier>, StoreError> {
        Ok(None)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

// =============================================================================
// Fetchers
// =============================================================================

/// `TierFetcher` speaking HTTP to a router, counting requests per tier.
#[derive(Clone)]
pub struct RouterFetcher {
    router: Router,
    thumbnails: Arc<AtomicUsize>,
    fulls: Arc<AtomicUsize>,
}

impl RouterFetcher {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            thumbnails: Arc::new(AtomicUsize::new(0)),
            fulls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn thumbnail_requests(&self) -> usize {
        self.thumbnails.load(Ordering::SeqCst)
    }

    pub fn full_requests(&self) -> usize {
        self.fulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TierFetcher for RouterFetcher {
    async fn list(&self) -> Result<Vec<ImageSummary>, ImportError> {
        let response = send(&self.router, get_request("/api/import")).await;
        if response.status() != StatusCode::OK {
            return Err(ImportError::validation(format!(
                "listing failed with {}",
                response.status()
            )));
        }
        let json = body_json(response).await;
        let entries = json.as_array().cloned().unwrap_or_default();
        Ok(entries
            .iter()
            .filter_map(|entry| {
                Some(ImageSummary {
                    id: entry["id"].as_str()?.parse().ok()?,
                    filename: entry["filename"].as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn fetch(&self, id: ImageId, tier: Tier) -> Result<Bytes, ImportError> {
        let uri = match tier {
            Tier::Thumbnail => {
                self.thumbnails.fetch_add(1, Ordering::SeqCst);
                format!("/api/import/thumbnail/{}", id)
            }
            Tier::FullRes => {
                self.fulls.fetch_add(1, Ordering::SeqCst);
                format!("/api/import/full/{}", id)
            }
        };
        let response = send(&self.router, get_request(&uri)).await;
        match response.status() {
            StatusCode::OK => Ok(body_bytes(response).await),
            StatusCode::NOT_FOUND => Err(ImportError::NotFound { id, tier }),
            status => Err(ImportError::validation(format!("fetch failed with {}", status))),
        }
    }
}
