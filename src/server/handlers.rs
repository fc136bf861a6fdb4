//! HTTP request handlers for the gallery import API.
//!
//! # Endpoints
//!
//! - `POST /api/import` - Import one or more images (multipart)
//! - `GET /api/import` - List stored images
//! - `GET /api/import/thumbnail/{id}` - Serve the preview tier
//! - `GET /api/import/full/{id}` and `GET /api/import/{id}` - Serve the full tier
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_CACHE_MAX_AGE;
use crate::error::ImportError;
use crate::ingest::{ImportService, ImportedImage};
use crate::retrieval::{RetrievalService, TierResponse};
use crate::store::{ImageStore, ImageSummary};
use crate::transcode::SourceImage;

/// Multipart field carrying the uploaded files.
pub const UPLOAD_FIELD: &str = "images";

/// Single-file field name, also accepted.
pub const UPLOAD_FIELD_SINGLE: &str = "image";

/// Seconds a client should wait after a 503.
const RETRY_AFTER_SECS: u32 = 1;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the import and retrieval services.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: ImageStore> {
    /// Read side: listing and tier lookups
    pub retrieval: Arc<RetrievalService<S>>,

    /// Write side: transcode and persist
    pub import: Arc<ImportService<S>>,

    /// Cache-Control max-age for tier payloads
    pub cache_max_age: u32,
}

impl<S: ImageStore> AppState<S> {
    pub fn new(retrieval: RetrievalService<S>, import: ImportService<S>) -> Self {
        Self::with_cache_max_age(retrieval, import, DEFAULT_CACHE_MAX_AGE)
    }

    pub fn with_cache_max_age(
        retrieval: RetrievalService<S>,
        import: ImportService<S>,
        cache_max_age: u32,
    ) -> Self {
        Self {
            retrieval: Arc::new(retrieval),
            import: Arc::new(import),
            cache_max_age,
        }
    }
}

impl<S: ImageStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            retrieval: Arc::clone(&self.retrieval),
            import: Arc::clone(&self.import),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" when the store cannot be counted
    pub status: String,

    pub version: String,

    /// Number of stored images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<usize>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ImportError to HTTP response.
///
/// 5xx responses carry a fixed message; the underlying error is only logged.
impl IntoResponse for ImportError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ImportError::Validation { message } => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }

            ImportError::NotFound { id, tier } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Image not found: {} ({})", id, tier),
            ),

            ImportError::PayloadTooLarge { message } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                message.clone(),
            ),

            ImportError::Overloaded { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "overloaded",
                "Server is busy, retry later".to_string(),
            ),

            ImportError::Processing { .. } | ImportError::Worker { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "processing_error",
                "Failed to process uploaded image".to_string(),
            ),

            ImportError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to access image storage".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                detail = %self,
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let body = Json(ErrorResponse::with_status(error_type, message, status));

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return (
                status,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image imports.
///
/// # Endpoint
///
/// `POST /api/import` with a `multipart/form-data` body holding one or more
/// files under the `images` field (or a single one under `image`).
///
/// # Response
///
/// - `200 OK`: JSON array of `{ "id", "filename", "contentType" }`
/// - `400 Bad Request`: no file or unreadable body
/// - `413 Payload Too Large`: body exceeds the upload limit
/// - `500 Internal Server Error`: a file failed to transcode or persist
/// - `503 Service Unavailable`: transcode queue full
pub async fn import_handler<S: ImageStore + 'static>(
    State(state): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<ImportedImage>>, ImportError> {
    let multipart = multipart.map_err(|rejection| {
        ImportError::validation(format!("Expected multipart upload: {}", rejection.body_text()))
    })?;

    let files = read_upload(multipart).await?;
    let count = files.len();

    let imported = state.import.import(files).await?;
    info!(files = count, "Import request completed");

    Ok(Json(imported))
}

/// Collect uploaded files from the accepted fields, in submission order.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<SourceImage>, ImportError> {
    let mut files = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e.status(), e.body_text())),
        };

        let name = field.name().unwrap_or_default();
        if name != UPLOAD_FIELD && name != UPLOAD_FIELD_SINGLE {
            debug!(field = name, "Ignoring unexpected multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data: Bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e.status(), e.body_text()))?;

        // Browsers send an empty part when no file was chosen
        if filename.is_empty() && data.is_empty() {
            continue;
        }

        files.push(SourceImage { filename, data });
    }

    if files.is_empty() {
        return Err(ImportError::validation("No file uploaded"));
    }
    Ok(files)
}

fn multipart_error(status: StatusCode, text: String) -> ImportError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ImportError::PayloadTooLarge { message: text }
    } else {
        ImportError::validation(format!("Malformed multipart body: {}", text))
    }
}

/// Handle listing requests.
///
/// # Endpoint
///
/// `GET /api/import`
///
/// # Response
///
/// `200 OK` with a JSON array of `{ "id", "filename" }` in creation order.
pub async fn list_handler<S: ImageStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<ImageSummary>>, ImportError> {
    Ok(Json(state.retrieval.list().await?))
}

/// Handle preview requests: `GET /api/import/thumbnail/{id}`.
pub async fn thumbnail_handler<S: ImageStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Response, ImportError> {
    let response = state.retrieval.thumbnail(&id).await?;
    Ok(tier_response(response, state.cache_max_age))
}

/// Handle full-resolution requests.
///
/// # Endpoint
///
/// `GET /api/import/full/{id}` or `GET /api/import/{id}`
///
/// # Headers
///
/// - `Content-Type`: stored MIME type
/// - `Cache-Control: public, max-age={cache_max_age}, immutable`
/// - `X-Cache-Hit: true|false`
pub async fn full_handler<S: ImageStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Response, ImportError> {
    let response = state.retrieval.full_res(&id).await?;
    Ok(tier_response(response, state.cache_max_age))
}

fn tier_response(response: TierResponse, cache_max_age: u32) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, response.content_type.to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}, immutable", cache_max_age),
            ),
        ],
        [("X-Cache-Hit", response.cache_hit.to_string())],
        Body::from(response.data),
    )
        .into_response()
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "images": 3
/// }
/// ```
pub async fn health_handler<S: ImageStore + 'static>(
    State(state): State<AppState<S>>,
) -> Json<HealthResponse> {
    let images = match state.retrieval.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Health check could not count images");
            None
        }
    };

    Json(HealthResponse {
        status: if images.is_some() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        images,
    })
}

// =============================================================================
// Tests
// =============================================================================
