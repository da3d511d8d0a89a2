//! Aggregation endpoint tests: field stats, analytics cross-tabs,
//! time-series, and market insights over a seeded store.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_field_stats_scenario() {
    let (app, _tmp) = create_app();
    let (status, body) = get(
        &app,
        &format!("/api/datasets/{}/stats?field=property_type", DATASET),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["field"], json!("property_type"));
    assert_eq!(body["total"], json!(3));
    assert_eq!(body["uniqueValues"], json!(2));
    assert_eq!(
        body["stats"],
        json!([
            {"value": "HDB", "count": 2},
            {"value": "CONDOMINIUM_APARTMENTS", "count": 1},
        ])
    );
}

#[tokio::test]
async fn test_field_stats_requires_known_field() {
    let (app, _tmp) = create_app();
    let (status, body) = get(&app, &format!("/api/datasets/{}/stats", DATASET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = get(
        &app,
        &format!("/api/datasets/{}/stats?field=transaction_date", DATASET),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_field_stats_town_excludes_sentinel() {
    let mut rows = CANONICAL_ROWS.to_vec();
    rows.push([
        "Chua Wei", "R003", "MAR-2024", "HDB", "RESALE", "BUYER", "-", "-", "-",
    ]);
    let (app, _tmp) = create_app_with(&rows);

    let (status, body) = get(
        &app,
        &format!("/api/datasets/{}/stats?field=town", DATASET),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // The sentinel row is excluded from both the list and the total.
    assert_eq!(body["total"], json!(3));
    assert!(body["stats"]
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["value"] != json!("-")));
}

#[tokio::test]
async fn test_analytics_single_dimension_scenario() {
    let (app, _tmp) = create_app();
    let (status, body) = get(
        &app,
        &format!("/api/datasets/{}/analytics?dimension1=represented", DATASET),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dimensions"], json!(["represented"]));
    assert_eq!(
        body["chartData"],
        json!([
            {"name": "BUYER", "value": 2},
            {"name": "SELLER", "value": 1},
        ])
    );
    assert_eq!(body["total"], json!(3));
}

#[tokio::test]
async fn test_analytics_two_dimensions() {
    let (app, _tmp) = create_app();
    let (status, body) = get(
        &app,
        &format!(
            "/api/datasets/{}/analytics?dimension1=property_type&dimension2=represented",
            DATASET
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dimensions"], json!(["property_type", "represented"]));
    assert_eq!(
        body["data"],
        json!([
            {"count": 1, "property_type": "CONDOMINIUM_APARTMENTS", "represented": "BUYER"},
            {"count": 1, "property_type": "HDB", "represented": "BUYER"},
            {"count": 1, "property_type": "HDB", "represented": "SELLER"},
        ])
    );
    assert_eq!(body["total"], json!(3));
}

#[tokio::test]
async fn test_analytics_requires_dimension1() {
    let (app, _tmp) = create_app();
    let (status, _) = get(&app, &format!("/api/datasets/{}/analytics", DATASET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(
        &app,
        &format!(
            "/api/datasets/{}/analytics?dimension1=salesperson_reg_num",
            DATASET
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analytics_with_filters() {
    let (app, _tmp) = create_app();
    // {"represented":["BUYER","SELLER"],"property_type":"HDB"}
    let filters = "%7B%22represented%22%3A%5B%22BUYER%22%2C%22SELLER%22%5D%2C%22property_type%22%3A%22HDB%22%7D";
    let (status, body) = get(
        &app,
        &format!(
            "/api/datasets/{}/analytics?dimension1=represented&filters={}",
            DATASET, filters
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Conjunction across keys, disjunction inside the array.
    assert_eq!(body["total"], json!(2));
}

#[tokio::test]
async fn test_timeseries_month_scenario() {
    let (app, _tmp) = create_app();
    let (status, body) = get(
        &app,
        &format!("/api/datasets/{}/timeseries?period=month", DATASET),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["period"], json!("month"));
    assert_eq!(
        body["series"],
        json!([
            {"period": "2024-01", "count": 2},
            {"period": "2024-02", "count": 1},
        ])
    );
    assert_eq!(body["total"], json!(3));
}

#[tokio::test]
async fn test_timeseries_defaults_to_month() {
    let (app, _tmp) = create_app();
    let (_, defaulted) = get(&app, &format!("/api/datasets/{}/timeseries", DATASET)).await;
    let (_, explicit) = get(
        &app,
        &format!("/api/datasets/{}/timeseries?period=month", DATASET),
    )
    .await;
    assert_eq!(defaulted["series"], explicit["series"]);
}

#[tokio::test]
async fn test_timeseries_year_and_ascending_order() {
    let mut rows = CANONICAL_ROWS.to_vec();
    rows.push([
        "Dana Ho", "R004", "OCT-2017", "HDB", "RESALE", "BUYER", "Yishun", "D27", "North",
    ]);
    let (app, _tmp) = create_app_with(&rows);

    let (status, body) = get(
        &app,
        &format!("/api/datasets/{}/timeseries?period=year", DATASET),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["series"],
        json!([
            {"period": "2017", "count": 1},
            {"period": "2024", "count": 3},
        ])
    );
}

#[tokio::test]
async fn test_timeseries_grouped() {
    let (app, _tmp) = create_app();
    let (status, body) = get(
        &app,
        &format!(
            "/api/datasets/{}/timeseries?period=month&groupBy=property_type",
            DATASET
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groupBy"], json!("property_type"));
    assert_eq!(
        body["series"],
        json!([
            {"period": "2024-01", "value": "CONDOMINIUM_APARTMENTS", "count": 1},
            {"period": "2024-01", "value": "HDB", "count": 1},
            {"period": "2024-02", "value": "HDB", "count": 1},
        ])
    );
}

#[tokio::test]
async fn test_timeseries_rejects_bad_parameters() {
    let (app, _tmp) = create_app();
    let (status, _) = get(
        &app,
        &format!("/api/datasets/{}/timeseries?period=week", DATASET),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(
        &app,
        &format!(
            "/api/datasets/{}/timeseries?groupBy=salesperson_name",
            DATASET
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_insights_composite() {
    let (app, _tmp) = create_app();
    let (status, body) = get(&app, &format!("/api/datasets/{}/insights", DATASET)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["summary"]["totalTransactions"], json!(3));
    assert_eq!(
        body["summary"]["dateRange"],
        json!({"from": "JAN-2024", "to": "FEB-2024"})
    );
    // mean(2, 1) rounds up to 2.
    assert_eq!(body["summary"]["monthlyAverage"], json!(2));
    assert_eq!(body["trends"]["yearlyGrowth"], json!("0%"));
    assert_eq!(
        body["distributions"]["propertyTypes"],
        json!([
            {"value": "HDB", "count": 2, "percentage": 66.7},
            {"value": "CONDOMINIUM_APARTMENTS", "count": 1, "percentage": 33.3},
        ])
    );
    assert_eq!(
        body["distributions"]["representation"],
        json!([
            {"value": "BUYER", "count": 2, "percentage": 66.7},
            {"value": "SELLER", "count": 1, "percentage": 33.3},
        ])
    );
}

#[tokio::test]
async fn test_insights_with_filters() {
    let (app, _tmp) = create_app();
    let filters = "%7B%22property_type%22%3A%22HDB%22%7D"; // {"property_type":"HDB"}
    let (status, body) = get(
        &app,
        &format!("/api/datasets/{}/insights?filters={}", DATASET, filters),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["totalTransactions"], json!(2));
    assert_eq!(
        body["distributions"]["propertyTypes"],
        json!([{"value": "HDB", "count": 2, "percentage": 100.0}])
    );
}

#[tokio::test]
async fn test_empty_results_are_success() {
    let (app, _tmp) = create_app();
    let filters = "%7B%22town%22%3A%22Nowhere%22%7D"; // {"town":"Nowhere"}
    let (status, body) = get(
        &app,
        &format!("/api/datasets/{}/insights?filters={}", DATASET, filters),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["totalTransactions"], json!(0));
    assert_eq!(body["summary"]["dateRange"], json!(null));
    assert_eq!(body["trends"]["yearlyGrowth"], json!("0%"));
}
