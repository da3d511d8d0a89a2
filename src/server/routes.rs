use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::*;

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Dataset routes
        .route("/api/datasets", get(list_datasets))
        .route("/api/datasets/:id", get(dataset_metadata))
        .route("/api/datasets/:id/data", get(dataset_data))
        // Analytics routes
        .route("/api/datasets/:id/stats", get(field_stats))
        .route("/api/datasets/:id/analytics", get(analytics))
        .route("/api/datasets/:id/timeseries", get(timeseries))
        .route("/api/datasets/:id/insights", get(insights))
        // Agent routes
        .route("/api/datasets/:id/agents/top", get(top_agents_handler))
        .route("/api/datasets/:id/agents/:reg_num", get(agent_profile_handler))
        // Cache diagnostics
        .route("/api/cache/stats", get(cache_stats_handler))
        .route("/api/cache/clear", post(cache_clear_handler))
        .route("/api/cache/clear/:dataset_id", post(cache_clear_dataset_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

/// Permissive CORS unless an origin allow-list is configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
