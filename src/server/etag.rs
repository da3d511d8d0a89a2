//! Conditional responses and response-cache plumbing.
//!
//! Every cacheable GET body gets a strong validator (an md5 hex digest of
//! the serialized bytes; content-only, never used for security). Requests
//! presenting the same validator get a 304 with no body. Cache keys are
//! the request line with query parameters sorted, so parameter order
//! cannot split semantically-identical requests.

use std::future::Future;
use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::cache::{CachedResponse, ResponseCache};
use crate::error::{AppError, AppResult};

pub const X_CACHE: &str = "X-Cache";

pub fn strong_etag(body: &str) -> String {
    format!("\"{:x}\"", md5::compute(body.as_bytes()))
}

/// `GET:` + path + query with parameters sorted by full `key=value` pair.
pub fn canonical_key(uri: &Uri) -> String {
    match uri.query() {
        Some(query) if !query.is_empty() => {
            let mut pairs: Vec<&str> = query.split('&').collect();
            pairs.sort_unstable();
            format!("GET:{}?{}", uri.path(), pairs.join("&"))
        }
        _ => format!("GET:{}", uri.path()),
    }
}

/// Filtered and searched requests are too high-cardinality to cache.
pub fn bypass_cache(uri: &Uri) -> bool {
    uri.query()
        .map(|query| {
            query.split('&').any(|pair| {
                let key = pair.split('=').next().unwrap_or("");
                key == "filters" || key == "search"
            })
        })
        .unwrap_or(false)
}

/// Does the request carry a validator matching `etag`? Accepts the tag
/// quoted or bare.
pub fn not_modified(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().trim_matches('"') == etag.trim_matches('"'))
        .unwrap_or(false)
}

/// Build the response: 304 when the client's validator matches, otherwise
/// the JSON body. The entity-tag and `X-Cache` header ride on both.
pub fn respond(headers: &HeaderMap, body: &Arc<String>, etag: &str, x_cache: &str) -> Response {
    if not_modified(headers, etag) {
        return (
            StatusCode::NOT_MODIFIED,
            [("etag", etag.to_string()), (X_CACHE, x_cache.to_string())],
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [
            ("content-type", "application/json".to_string()),
            ("etag", etag.to_string()),
            (X_CACHE, x_cache.to_string()),
        ],
        body.as_ref().clone(),
    )
        .into_response()
}

/// The shared read path: cache lookup, conditional handling, and
/// store-on-miss. `produce` only runs on a miss. Nothing is cached until
/// the body has fully serialized, so a failed request never leaves a
/// partial entry behind.
pub async fn serve_cached<F>(
    cache: &ResponseCache,
    headers: &HeaderMap,
    uri: &Uri,
    produce: F,
) -> Result<Response, AppError>
where
    F: Future<Output = AppResult<serde_json::Value>>,
{
    let bypass = bypass_cache(uri);
    let key = canonical_key(uri);

    if !bypass {
        if let Some(hit) = cache.get(&key).await {
            return Ok(respond(headers, &hit.body, &hit.etag, "HIT"));
        }
    }

    let value = produce.await?;
    let body = Arc::new(serde_json::to_string(&value)?);
    let etag = strong_etag(&body);

    if !bypass {
        cache
            .put(
                key,
                CachedResponse {
                    body: body.clone(),
                    etag: etag.clone(),
                },
            )
            .await;
    }

    Ok(respond(headers, &body, &etag, "MISS"))
}
