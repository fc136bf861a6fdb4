//! Router configuration for the gallery server.
//!
//! # Route Structure
//!
//! ```text
//! /health                        - Health check
//! /api/import                    - POST import, GET list
//! /api/import/thumbnail/{id}     - Preview tier
//! /api/import/full/{id}          - Full-resolution tier
//! /api/import/{id}               - Full-resolution tier (short form)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use progressive_gallery::server::{create_router, RouterConfig};
//!
//! let router = create_router(retrieval, import, RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    full_handler, health_handler, import_handler, list_handler, thumbnail_handler, AppState,
};
use crate::config::{DEFAULT_CACHE_MAX_AGE, DEFAULT_MAX_UPLOAD_BYTES};
use crate::ingest::ImportService;
use crate::retrieval::RetrievalService;
use crate::store::ImageStore;
use crate::transcode::{default_workers, TranscodePool, Transcoder, DEFAULT_QUEUE_DEPTH};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration with defaults:
    /// any CORS origin, 1 day max-age, 50MB uploads, tracing on.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// Builds the import and retrieval routes, the upload body limit, CORS and
/// (optionally) request tracing around the given services.
pub fn create_router<S>(
    retrieval: RetrievalService<S>,
    import: ImportService<S>,
    config: RouterConfig,
) -> Router
where
    S: ImageStore + 'static,
{
    let app_state = AppState::with_cache_max_age(retrieval, import, config.cache_max_age);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler::<S>))
        .route(
            "/api/import",
            get(list_handler::<S>).post(import_handler::<S>),
        )
        .route("/api/import/thumbnail/{id}", get(thumbnail_handler::<S>))
        .route("/api/import/full/{id}", get(full_handler::<S>))
        .route("/api/import/{id}", get(full_handler::<S>))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Create a router over `store` with default transcode and cache settings.
pub fn create_dev_router<S>(store: Arc<S>) -> Router
where
    S: ImageStore + 'static,
{
    let pool = TranscodePool::new(Transcoder::default(), default_workers(), DEFAULT_QUEUE_DEPTH);
    create_router(
        RetrievalService::new(Arc::clone(&store)),
        ImportService::new(pool, store),
        RouterConfig::new(),
    )
}

// =============================================================================
// Tests
// =============================================================================
