//! API integration tests for retrieval and error handling.
//!
//! Tests verify:
//! - Listing and tier retrieval by identifier
//! - Error cases (unknown id, malformed id, storage failures)
//! - HTTP response codes, JSON error bodies and caching headers

use std::sync::Arc;

use axum::http::StatusCode;

use progressive_gallery::RouterConfig;

use super::test_utils::{
    body_bytes, body_json, get_request, import_files, is_valid_jpeg, png_bytes, router_for, send,
    test_router, FailingStore,
};

const UNKNOWN_ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_image_count() {
    let (router, _) = test_router();
    import_files(&router, vec![("a.png", png_bytes(8, 8))]).await;

    let response = send(&router, get_request("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["images"], 1);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_empty() {
    let (router, _) = test_router();
    let response = send(&router, get_request("/api/import")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_list_in_creation_order_without_payloads() {
    let (router, _) = test_router();
    let first = import_files(&router, vec![("first.png", png_bytes(8, 8))]).await;
    let second = import_files(&router, vec![("second.png", png_bytes(8, 8))]).await;

    let response = send(&router, get_request("/api/import")).await;
    let listed = body_json(response).await;
    let listed = listed.as_array().unwrap();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], first[0]["id"]);
    assert_eq!(listed[0]["filename"], "first.png");
    assert_eq!(listed[1]["id"], second[0]["id"]);

    // Metadata only: exactly id and filename
    let keys: Vec<&String> = listed[0].as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 2);
}

// =============================================================================
// Tier Retrieval
// =============================================================================

#[tokio::test]
async fn test_thumbnail_and_full_share_content_type() {
    let (router, _) = test_router();
    let imported = import_files(&router, vec![("photo.png", png_bytes(64, 48))]).await;
    let id = imported[0]["id"].as_str().unwrap();

    let thumb = send(&router, get_request(&format!("/api/import/thumbnail/{}", id))).await;
    assert_eq!(thumb.status(), StatusCode::OK);
    let thumb_type = thumb.headers().get("content-type").unwrap().clone();

    let full = send(&router, get_request(&format!("/api/import/full/{}", id))).await;
    assert_eq!(full.status(), StatusCode::OK);
    assert_eq!(full.headers().get("content-type").unwrap(), &thumb_type);
    assert_eq!(thumb_type, "image/jpeg");

    let thumb_body = body_bytes(thumb).await;
    let full_body = body_bytes(full).await;
    assert!(is_valid_jpeg(&thumb_body));
    assert!(is_valid_jpeg(&full_body));
    assert_ne!(thumb_body, full_body);
}

#[tokio::test]
async fn test_short_full_path_serves_same_bytes() {
    let (router, _) = test_router();
    let imported = import_files(&router, vec![("photo.png", png_bytes(20, 20))]).await;
    let id = imported[0]["id"].as_str().unwrap();

    let long = body_bytes(send(&router, get_request(&format!("/api/import/full/{}", id))).await).await;
    let short = body_bytes(send(&router, get_request(&format!("/api/import/{}", id))).await).await;
    assert_eq!(long, short);
}

#[tokio::test]
async fn test_tier_caching_headers() {
    let (router, _) = test_router();
    let imported = import_files(&router, vec![("photo.png", png_bytes(16, 16))]).await;
    let uri = format!("/api/import/thumbnail/{}", imported[0]["id"].as_str().unwrap());

    let first = send(&router, get_request(&uri)).await;
    let cache_control = first.headers().get("cache-control").unwrap().to_str().unwrap();
    assert!(cache_control.contains("max-age="));
    assert!(cache_control.contains("immutable"));
    assert_eq!(first.headers().get("x-cache-hit").unwrap(), "false");

    let second = send(&router, get_request(&uri)).await;
    assert_eq!(second.headers().get("x-cache-hit").unwrap(), "true");
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    let store = Arc::new(progressive_gallery::MemoryStore::new());
    let router = router_for(
        store,
        RouterConfig::new().with_tracing(false).with_cache_max_age(60),
        1,
        1,
    );
    let imported = import_files(&router, vec![("photo.png", png_bytes(16, 16))]).await;
    let uri = format!("/api/import/full/{}", imported[0]["id"].as_str().unwrap());

    let response = send(&router, get_request(&uri)).await;
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60, immutable"
    );
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_unknown_thumbnail_is_404_json() {
    let (router, _) = test_router();
    let response = send(
        &router,
        get_request(&format!("/api/import/thumbnail/{}", UNKNOWN_ID)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_unknown_full_is_404() {
    let (router, _) = test_router();
    for uri in [
        format!("/api/import/full/{}", UNKNOWN_ID),
        format!("/api/import/{}", UNKNOWN_ID),
    ] {
        let response = send(&router, get_request(&uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_malformed_id_is_400() {
    let (router, _) = test_router();
    for uri in [
        "/api/import/thumbnail/not-an-id",
        "/api/import/full/12345",
        "/api/import/..%2F..%2Fetc",
    ] {
        let response = send(&router, get_request(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_request");
    }
}

#[tokio::test]
async fn test_storage_failure_is_generic_500() {
    let router = router_for(
        Arc::new(FailingStore),
        RouterConfig::new().with_tracing(false),
        1,
        1,
    );

    let response = send(&router, get_request("/api/import")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "storage_error");
    // Internal detail stays in the logs
    assert!(!json["message"].as_str().unwrap().contains("listing unavailable"));
}

#[tokio::test]
async fn test_health_with_failing_store_is_200() {
    let router = router_for(
        Arc::new(FailingStore),
        RouterConfig::new().with_tracing(false),
        1,
        1,
    );
    let response = send(&router, get_request("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}
