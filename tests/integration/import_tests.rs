//! Import integration tests.
//!
//! Tests verify:
//! - Multi-file and single-file uploads produce distinct, retrievable records
//! - Stored tiers decode to the expected dimensions
//! - Batch rejection on a corrupt file, with nothing persisted
//! - Body limit, overload and storage-failure responses

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use progressive_gallery::{FsStore, ImageStore, MemoryStore, RouterConfig, Tier};

use super::test_utils::{
    body_bytes, body_json, corrupt_bytes, get_request, import_files, import_request, jpeg_bytes,
    png_bytes, router_for, send, test_router, FailingStore, Part,
};

// =============================================================================
// Successful Imports
// =============================================================================

#[tokio::test]
async fn test_import_three_images() {
    let (router, store) = test_router();

    let imported = import_files(
        &router,
        vec![
            ("one.png", png_bytes(120, 80)),
            ("two.jpg", jpeg_bytes(64, 64)),
            ("three.png", png_bytes(33, 200)),
        ],
    )
    .await;

    assert_eq!(imported.len(), 3);
    assert_eq!(store.len().await.unwrap(), 3);

    let ids: HashSet<&str> = imported.iter().map(|i| i["id"].as_str().unwrap()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(imported[0]["filename"], "one.png");
    assert_eq!(imported[1]["contentType"], "image/jpeg");

    let sizes = [(120, 80), (64, 64), (33, 200)];
    for (entry, (width, height)) in imported.iter().zip(sizes) {
        let id = entry["id"].as_str().unwrap();

        let thumb = body_bytes(send(&router, get_request(&format!("/api/import/thumbnail/{}", id))).await).await;
        let thumb = image::load_from_memory(&thumb).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (16, 16));

        let full = body_bytes(send(&router, get_request(&format!("/api/import/full/{}", id))).await).await;
        assert_eq!(
            image::guess_format(&full).unwrap(),
            image::ImageFormat::Jpeg
        );
        let full = image::load_from_memory(&full).unwrap();
        assert_eq!((full.width(), full.height()), (width, height));
    }
}

#[tokio::test]
async fn test_single_image_field_accepted() {
    let (router, _) = test_router();
    let request = import_request(&[Part::file("image", "solo.png", png_bytes(10, 10))]);

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_same_filename_twice_gets_two_ids() {
    let (router, store) = test_router();
    let first = import_files(&router, vec![("dup.png", png_bytes(8, 8))]).await;
    let second = import_files(&router, vec![("dup.png", png_bytes(8, 8))]).await;

    assert_ne!(first[0]["id"], second[0]["id"]);
    assert_eq!(store.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_unrelated_fields_ignored() {
    let (router, _) = test_router();
    let request = import_request(&[
        Part::text("caption", "holiday"),
        Part::file("images", "a.png", png_bytes(8, 8)),
        Part::file("attachment", "notes.txt", b"hello".to_vec()),
    ]);

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_persists_to_directory_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::open(dir.path()).await.unwrap());
    let router = router_for(Arc::clone(&store), RouterConfig::new().with_tracing(false), 2, 2);

    let imported = import_files(&router, vec![("disk.png", png_bytes(30, 30))]).await;
    let id = imported[0]["id"].as_str().unwrap().parse().unwrap();

    // A fresh store over the same directory sees the record
    let reopened = FsStore::open(dir.path()).await.unwrap();
    let listed = reopened.list_metadata().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].filename, "disk.png");
    assert!(reopened.get_tier(id, Tier::Thumbnail).await.unwrap().is_some());
}

// =============================================================================
// Rejected Imports
// =============================================================================

#[tokio::test]
async fn test_no_file_is_400() {
    let (router, store) = test_router();
    let request = import_request(&[Part::text("caption", "nothing attached")]);

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_multipart_body_is_400() {
    let (router, _) = test_router();
    let request = Request::builder()
        .method("POST")
        .uri("/api/import")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_corrupt_file_rejects_whole_batch() {
    let (router, store) = test_router();
    let request = import_request(&[
        Part::file("images", "good.png", png_bytes(8, 8)),
        Part::file("images", "broken.jpg", corrupt_bytes()),
        Part::file("images", "also-good.png", png_bytes(8, 8)),
    ]);

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "processing_error");
    assert_eq!(json["status"], 500);

    assert_eq!(store.len().await.unwrap(), 0);
    let listed = body_json(send(&router, get_request("/api/import")).await).await;
    assert_eq!(listed, serde_json::json!([]));
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let store = Arc::new(MemoryStore::new());
    let router = router_for(
        Arc::clone(&store),
        RouterConfig::new()
            .with_tracing(false)
            .with_max_upload_bytes(1024),
        1,
        1,
    );

    let request = import_request(&[Part::file("images", "big.png", vec![0u8; 8 * 1024])]);
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_store_failure_is_500_without_detail() {
    let router = router_for(
        Arc::new(FailingStore),
        RouterConfig::new().with_tracing(false),
        1,
        1,
    );

    let response = send(
        &router,
        import_request(&[Part::file("images", "a.png", png_bytes(8, 8))]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "storage_error");
    assert!(!json["message"].as_str().unwrap().contains("/var/lib"));
}

#[tokio::test]
async fn test_concurrent_imports_all_succeed_within_capacity() {
    let (router, store) = test_router();

    let mut tasks = Vec::new();
    for n in 0..4 {
        let router = router.clone();
        tasks.push(tokio::spawn(async move {
            let request = import_request(&[Part::file(
                "images",
                &format!("c{}.png", n),
                png_bytes(16 + n, 16),
            )]);
            send(&router, request).await.status()
        }));
    }

    // Two workers plus a queue of four admit all four requests
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(store.len().await.unwrap(), 4);
}
