use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{limit_param, AppState};
use crate::error::{AppError, AppResult};
use crate::query::agents::{agent_profile, top_agents};
use crate::query::Filters;
use crate::server::etag::serve_cached;

#[derive(Debug, Deserialize)]
pub struct TopAgentsParams {
    pub limit: Option<String>,
    pub filters: Option<String>,
    pub search: Option<String>,
}

/// `GET /api/datasets/{id}/agents/top`: ranked agents with their leading
/// property type, transaction type, representation, and town.
pub async fn top_agents_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TopAgentsParams>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    state.require_dataset(&id)?;
    let limit = limit_param(params.limit.as_ref(), 50, 250)?;
    let filters = Filters::parse(params.filters.as_deref())?;
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let store = state.store.clone();
    serve_cached(&state.stats_cache, &headers, &uri, async move {
        let result = store
            .query(move |conn| top_agents(conn, limit, &filters, search.as_deref()))
            .await?;
        Ok(json!({
            "total": result.total,
            "showing": result.agents.len(),
            "agents": result.agents,
            "statistics": result.statistics,
        }))
    })
    .await
}

/// `GET /api/datasets/{id}/agents/{regNum}`: full per-agent profile.
pub async fn agent_profile_handler(
    State(state): State<AppState>,
    Path((id, reg_num)): Path<(String, String)>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    state.require_dataset(&id)?;

    let store = state.store.clone();
    serve_cached(&state.stats_cache, &headers, &uri, async move {
        let profile = store
            .query(move |conn| agent_profile(conn, &reg_num))
            .await?;
        let body: AppResult<Value> = serde_json::to_value(&profile).map_err(Into::into);
        body
    })
    .await
}
