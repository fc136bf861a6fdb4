//! # Progressive Gallery
//!
//! An image import service with progressive, viewport-driven display.
//!
//! Every uploaded image is stored as two encodings: the full-resolution image
//! and a tiny square preview. A gallery client shows a placeholder for each
//! image, swaps in the preview once the image scrolls into view, and upgrades
//! to full resolution once every visible preview is ready.
//!
//! ## Features
//!
//! - **Batch import**: multipart uploads transcoded on a bounded worker pool
//! - **Atomic records**: both tiers become visible together, never one alone
//! - **Pluggable storage**: in-memory or crash-safe directory store
//! - **Tier cache**: LRU cache in front of retrieval
//! - **Viewport controller**: per-image state machine with a batch-readiness barrier
//!
//! ## Architecture
//!
//! - [`transcode`] - Decoding, resizing and JPEG encoding of both tiers
//! - [`store`] - Image records and storage backends
//! - [`ingest`] - Batch import: transcode then persist
//! - [`retrieval`] - Read access by identity, with caching
//! - [`client`] - Viewport activation controller and async gallery driver
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use progressive_gallery::{create_dev_router, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = create_dev_router(Arc::new(MemoryStore::new()));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod retrieval;
pub mod server;
pub mod store;
pub mod transcode;

// Re-export commonly used types
pub use client::{
    ActivationPolicy, Command, DecodedImage, Frame, GalleryDriver, GeometryObserver, ImageState,
    ObserverOptions, ViewportController, ViewportEvent, ViewportObserver,
};
pub use config::Config;
pub use error::{ImportError, ProcessingError, StoreError};
pub use ingest::{ImportService, ImportedImage};
pub use retrieval::{parse_id, RetrievalService, TierCache, TierFetcher, TierResponse};
pub use server::{create_dev_router, create_router, AppState, ErrorResponse, RouterConfig};
pub use store::{
    FsStore, ImageId, ImageRecord, ImageStore, ImageSummary, MemoryStore, NewImage, StoredTier,
    Tier,
};
pub use transcode::{SourceImage, TranscodeOptions, Transcoded, TranscodePool, Transcoder};
