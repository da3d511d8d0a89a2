//! Common test utilities for the HTTP API tests.
//!
//! Provides shared helpers for:
//! - Building a temp store (schema, rows, metadata, aggregates) on disk
//! - Writing the dataset catalog next to it
//! - Spinning up an isolated router per case
//! - Issuing GET/POST requests via tower's oneshot

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use ceastats::store::precompute;
use ceastats::{create_router, AppState, Catalog, Store};
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const DATASET: &str = "cea-transactions";

/// One transaction row: name, reg_num, date, property_type,
/// transaction_type, represented, town, district, general_location.
pub type Row<'a> = [&'a str; 9];

/// The three rows behind the literal end-to-end expectations.
pub const CANONICAL_ROWS: [Row<'static>; 3] = [
    [
        "Alice Tan",
        "R001",
        "JAN-2024",
        "HDB",
        "RESALE",
        "BUYER",
        "Punggol",
        "D19",
        "North-East",
    ],
    [
        "Alice Tan",
        "R001",
        "FEB-2024",
        "HDB",
        "RESALE",
        "SELLER",
        "Punggol",
        "D19",
        "North-East",
    ],
    [
        "Ben Lee",
        "R002",
        "JAN-2024",
        "CONDOMINIUM_APARTMENTS",
        "NEW SALE",
        "BUYER",
        "Bedok",
        "D16",
        "East",
    ],
];

pub fn create_app() -> (Router, TempDir) {
    create_app_with(&CANONICAL_ROWS)
}

pub fn create_app_with(rows: &[Row]) -> (Router, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let processed = tmp.path().join("processed");
    std::fs::create_dir_all(&processed).unwrap();

    let db_path = processed.join("cea-transactions.db");
    let mut conn = Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TABLE transactions (
            id INTEGER PRIMARY KEY,
            salesperson_name TEXT,
            salesperson_reg_num TEXT,
            transaction_date TEXT,
            property_type TEXT,
            transaction_type TEXT,
            represented TEXT,
            town TEXT,
            district TEXT,
            general_location TEXT
        );
        CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT);",
    )
    .unwrap();
    for (i, row) in rows.iter().enumerate() {
        conn.execute(
            "INSERT INTO transactions VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                (i + 1) as i64,
                row[0],
                row[1],
                row[2],
                row[3],
                row[4],
                row[5],
                row[6],
                row[7],
                row[8],
            ],
        )
        .unwrap();
    }
    conn.execute_batch(&format!(
        "INSERT INTO metadata VALUES ('row_count', '{}');
         INSERT INTO metadata VALUES ('column_count', '9');
         INSERT INTO metadata VALUES ('source_timestamp', '2024-06-01T00:00:00Z');",
        rows.len()
    ))
    .unwrap();
    precompute::run(&mut conn).unwrap();
    drop(conn);

    std::fs::write(
        processed.join("datasets.json"),
        json!({
            "version": "1.0",
            "lastUpdated": "2024-06-01T00:00:00Z",
            "datasets": [{
                "id": DATASET,
                "name": "CEA Transactions",
                "description": "Real-estate transaction records",
                "recordCount": rows.len(),
            }]
        })
        .to_string(),
    )
    .unwrap();

    let store = Store::open(&db_path).expect("Failed to open store");
    let catalog = Catalog::load(&processed).expect("Failed to load catalog");
    let state = AppState::new(store, catalog);
    (create_router(state, &[]), tmp)
}

/// GET returning status and parsed JSON body.
pub async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    let (status, _, _, json) = get_full(app, path, None).await;
    (status, json)
}

/// GET returning status, headers, raw body, and parsed JSON.
pub async fn get_full(
    app: &Router,
    path: &str,
    if_none_match: Option<&str>,
) -> (StatusCode, HeaderMap, String, Value) {
    let mut request = Request::builder().method("GET").uri(path);
    if let Some(etag) = if_none_match {
        request = request.header(header::IF_NONE_MATCH, etag);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let raw = String::from_utf8(bytes.to_vec()).unwrap();
    let json: Value = serde_json::from_str(&raw).unwrap_or(json!(null));
    (status, headers, raw, json)
}

/// POST with an empty body.
pub async fn post(app: &Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(json!(null));
    (status, json)
}

pub fn etag_of(headers: &HeaderMap) -> String {
    headers
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .expect("response must carry an ETag")
        .to_string()
}

pub fn x_cache_of(headers: &HeaderMap) -> String {
    headers
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .expect("response must carry X-Cache")
        .to_string()
}
