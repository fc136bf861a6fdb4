//! HTTP server layer for the gallery.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   POST /api/import          GET /api/import[/thumbnail|/full]   │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (multipart, tiers, JSON) │  │ (body limit, CORS, tracing) │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    full_handler, health_handler, import_handler, list_handler, thumbnail_handler, AppState,
    ErrorResponse, HealthResponse, UPLOAD_FIELD, UPLOAD_FIELD_SINGLE,
};
pub use routes::{create_dev_router, create_router, RouterConfig};
