use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{limit_param, page_param, AppState};
use crate::error::AppError;
use crate::query::agg;
use crate::query::Filters;
use crate::server::etag::serve_cached;
use crate::store::schema;

/// `GET /api/datasets`: the catalog document, verbatim.
pub async fn list_datasets(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let catalog = state.catalog.clone();
    serve_cached(&state.api_cache, &headers, &uri, async move {
        Ok(catalog.document().clone())
    })
    .await
}

/// `GET /api/datasets/{id}`: catalog entry enriched with store metadata,
/// the table schema, and chart recommendations.
pub async fn dataset_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    state.require_dataset(&id)?;

    let store = state.store.clone();
    let catalog = state.catalog.clone();
    serve_cached(&state.api_cache, &headers, &uri, async move {
        let entry = catalog.dataset(&id).cloned().unwrap_or(Value::Null);

        let mut metadata = serde_json::Map::new();
        for (key, value) in store.metadata().await? {
            metadata.insert(key, Value::String(value));
        }
        if let Some(snapshot) = catalog.snapshot(&id).and_then(Value::as_object) {
            for (key, value) in snapshot {
                if key != "visualizationRecommendations" {
                    metadata.insert(key.clone(), value.clone());
                }
            }
        }

        let recommendations = catalog
            .snapshot(&id)
            .and_then(|s| s.get("visualizationRecommendations"))
            .cloned()
            .unwrap_or_else(schema::visualization_recommendations);

        Ok(json!({
            "id": id,
            "name": entry.get("name").cloned().unwrap_or(Value::Null),
            "description": entry.get("description").cloned().unwrap_or(Value::Null),
            "metadata": Value::Object(metadata),
            "schema": schema::dataset_schema(),
            "visualizationRecommendations": recommendations,
        }))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct DataParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub filters: Option<String>,
}

/// `GET /api/datasets/{id}/data`: one page of raw rows with pagination
/// metadata. `total` comes from a separate COUNT under the same filter.
pub async fn dataset_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DataParams>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    state.require_dataset(&id)?;
    let page = page_param(params.page.as_ref())?;
    let limit = limit_param(params.limit.as_ref(), 50, 500)?;
    let filters = Filters::parse(params.filters.as_deref())?;

    let store = state.store.clone();
    serve_cached(&state.api_cache, &headers, &uri, async move {
        let rows = store
            .query(move |conn| agg::fetch_page(conn, &filters, page, limit))
            .await?;
        let total_pages = if rows.total == 0 {
            0
        } else {
            (rows.total + limit - 1) / limit
        };
        Ok(json!({
            "data": rows.rows,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": rows.total,
                "totalPages": total_pages,
            }
        }))
    })
    .await
}
