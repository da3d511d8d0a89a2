//! Cache observability and invalidation over the HTTP surface.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_cache_stats_shape() {
    let (app, _tmp) = create_app();
    let (status, body) = get(&app, "/api/cache/stats").await;
    assert_eq!(status, StatusCode::OK);
    for pool in ["api", "stats"] {
        assert!(body[pool]["hits"].is_number(), "{}", pool);
        assert!(body[pool]["misses"].is_number(), "{}", pool);
        assert!(body[pool]["size"].is_number(), "{}", pool);
        assert!(body[pool]["capacity"].is_number(), "{}", pool);
        assert!(body[pool]["hitRate"].is_number(), "{}", pool);
    }
    assert_eq!(body["api"]["capacity"], json!(200));
    assert_eq!(body["stats"]["capacity"], json!(50));
}

#[tokio::test]
async fn test_cache_stats_track_traffic() {
    let (app, _tmp) = create_app();
    let path = format!("/api/datasets/{}/data", DATASET);
    get(&app, &path).await;
    get(&app, &path).await;

    let (_, body) = get(&app, "/api/cache/stats").await;
    assert_eq!(body["api"]["misses"], json!(1));
    assert_eq!(body["api"]["hits"], json!(1));
    assert_eq!(body["api"]["size"], json!(1));
}

#[tokio::test]
async fn test_cache_clear_resets_entries() {
    let (app, _tmp) = create_app();
    let path = format!("/api/datasets/{}/data", DATASET);
    get(&app, &path).await;

    let (status, body) = post(&app, "/api/cache/clear").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Cache cleared"));
    assert_eq!(body["entriesCleared"], json!(1));

    let (_, headers, _, _) = get_full(&app, &path, None).await;
    assert_eq!(x_cache_of(&headers), "MISS");
}

#[tokio::test]
async fn test_dataset_scoped_clear() {
    let (app, _tmp) = create_app();
    let data_path = format!("/api/datasets/{}/data", DATASET);
    get(&app, &data_path).await;
    get(&app, "/api/datasets").await;

    let (status, body) = post(&app, &format!("/api/cache/clear/{}", DATASET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entriesCleared"], json!(1));

    // The dataset-scoped entry is gone; the catalog entry survives.
    let (_, headers, _, _) = get_full(&app, &data_path, None).await;
    assert_eq!(x_cache_of(&headers), "MISS");
    let (_, headers, _, _) = get_full(&app, "/api/datasets", None).await;
    assert_eq!(x_cache_of(&headers), "HIT");
}

#[tokio::test]
async fn test_api_and_stats_pools_are_independent() {
    let (app, _tmp) = create_app();
    get(&app, &format!("/api/datasets/{}/data", DATASET)).await;
    get(
        &app,
        &format!("/api/datasets/{}/stats?field=property_type", DATASET),
    )
    .await;

    let (_, body) = get(&app, "/api/cache/stats").await;
    assert_eq!(body["api"]["size"], json!(1));
    assert_eq!(body["stats"]["size"], json!(1));
}
