use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::catalog::Catalog;
use crate::error::{AppError, AppResult};
use crate::store::Store;

/// Light endpoints: dataset list, metadata, paginated rows.
pub const API_CACHE_ENTRIES: usize = 200;
pub const API_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Heavy analytics: aggregates, time-series, insights, agent roll-ups.
pub const STATS_CACHE_ENTRIES: usize = 50;
pub const STATS_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub catalog: Arc<Catalog>,
    pub api_cache: Arc<ResponseCache>,
    pub stats_cache: Arc<ResponseCache>,
}

impl AppState {
    pub fn new(store: Store, catalog: Catalog) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
            api_cache: Arc::new(ResponseCache::new(API_CACHE_ENTRIES, API_CACHE_TTL)),
            stats_cache: Arc::new(ResponseCache::new(STATS_CACHE_ENTRIES, STATS_CACHE_TTL)),
        }
    }

    pub fn require_dataset(&self, id: &str) -> AppResult<()> {
        if self.catalog.contains(id) {
            Ok(())
        } else {
            Err(AppError::DatasetNotFound)
        }
    }
}

/// Liveness probe; not cached and carries no validator.
pub async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Hit-rate diagnostics for both pools.
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "api": state.api_cache.stats().await,
        "stats": state.stats_cache.stats().await,
    }))
}

pub async fn cache_clear_handler(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.api_cache.clear().await + state.stats_cache.clear().await;
    tracing::info!("cache cleared ({} entries)", cleared);
    Json(serde_json::json!({
        "message": "Cache cleared",
        "entriesCleared": cleared,
    }))
}

/// Flush every cached response whose key mentions the dataset.
pub async fn cache_clear_dataset_handler(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> Json<Value> {
    let fragment = format!("/datasets/{}", dataset_id);
    let cleared = state.api_cache.invalidate(&fragment).await
        + state.stats_cache.invalidate(&fragment).await;
    Json(serde_json::json!({
        "message": format!("Cache cleared for dataset {}", dataset_id),
        "entriesCleared": cleared,
    }))
}
