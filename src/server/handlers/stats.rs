use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{limit_param, AppState};
use crate::error::{AppError, AppResult};
use crate::query::agg::{self, CrossTab, ValueCount};
use crate::query::insights::market_insights;
use crate::query::timeseries::{self, clip_grouped, clip_series};
use crate::query::{Filters, Period};
use crate::server::etag::serve_cached;
use crate::store::schema::{self, Column};

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub field: Option<String>,
    pub limit: Option<String>,
    pub filters: Option<String>,
}

/// `GET /api/datasets/{id}/stats`: value counts for one field.
/// Unfiltered property-type, transaction-type, and town requests read the
/// pre-computed tables; everything else aggregates `transactions`.
pub async fn field_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<StatsParams>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    state.require_dataset(&id)?;
    let field = params
        .field
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("field parameter is required".to_string()))?;
    let column = schema::statable_column(field)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown field '{}'", field)))?;
    let limit = limit_param(params.limit.as_ref(), 100, 1000)?;
    let filters = Filters::parse(params.filters.as_deref())?;

    let store = state.store.clone();
    serve_cached(&state.stats_cache, &headers, &uri, async move {
        let tab = store
            .query(move |conn| stats_crosstab(conn, column, &filters, limit))
            .await?;
        let stats: Vec<Value> = tab
            .rows
            .iter()
            .map(|row| json!({"value": row.value, "count": row.count}))
            .collect();
        Ok(json!({
            "field": column,
            "total": tab.total,
            "uniqueValues": tab.unique_values,
            "stats": stats,
        }))
    })
    .await
}

/// Path selection for the stats endpoint. Town semantics exclude the
/// sentinel on both paths so the two stay deep-equal.
fn stats_crosstab(
    conn: &Connection,
    column: &'static str,
    filters: &Filters,
    limit: i64,
) -> AppResult<CrossTab> {
    if filters.is_empty() {
        match column {
            "property_type" => {
                return share_table_crosstab(conn, "property_type_stats", column, limit, false)
            }
            "transaction_type" => {
                return share_table_crosstab(conn, "transaction_type_stats", column, limit, false)
            }
            "town" => return share_table_crosstab(conn, "town_stats", column, limit, true),
            _ => {}
        }
    }
    agg::single_dimension(conn, column, filters, Some(limit), column == "town")
}

/// Fast path: read a pre-computed `<column>_stats` table, 2-4 orders of
/// magnitude smaller than `transactions`.
fn share_table_crosstab(
    conn: &Connection,
    table: &str,
    column: &str,
    limit: i64,
    sentinel_excluded: bool,
) -> AppResult<CrossTab> {
    let sql = format!(
        "SELECT {column}, count FROM {table} ORDER BY count DESC, {column} ASC LIMIT ?",
        column = column,
        table = table,
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(ValueCount {
                value: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let unique_values: i64 = conn
        .prepare_cached(&format!("SELECT COUNT(*) FROM {}", table))?
        .query_row([], |row| row.get(0))?;

    // Sentinel-excluding tables count only the rows they represent.
    let total: i64 = if sentinel_excluded {
        conn.prepare_cached(&format!("SELECT COALESCE(SUM(count), 0) FROM {}", table))?
            .query_row([], |row| row.get(0))?
    } else {
        conn.prepare_cached("SELECT COUNT(*) FROM transactions")?
            .query_row([], |row| row.get(0))?
    };

    Ok(CrossTab {
        rows,
        unique_values,
        total,
    })
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    pub dimension1: Option<String>,
    pub dimension2: Option<String>,
    pub filters: Option<String>,
}

/// `GET /api/datasets/{id}/analytics`: one- or two-dimension cross-tab.
pub async fn analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<AnalyticsParams>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    state.require_dataset(&id)?;
    let dim1 = parse_dimension(params.dimension1.as_deref(), "dimension1")?;
    let dim2 = params
        .dimension2
        .as_deref()
        .map(|raw| {
            Column::parse(raw).ok_or_else(|| {
                AppError::BadRequest(format!("Unknown dimension2 '{}'", raw))
            })
        })
        .transpose()?;
    let filters = Filters::parse(params.filters.as_deref())?;

    let store = state.store.clone();
    serve_cached(&state.stats_cache, &headers, &uri, async move {
        match dim2 {
            None => {
                let tab = store
                    .query(move |conn| {
                        agg::single_dimension(conn, dim1.as_sql(), &filters, None, false)
                    })
                    .await?;
                let data: Vec<Value> = tab
                    .rows
                    .iter()
                    .map(|row| json!({"value": row.value, "count": row.count}))
                    .collect();
                let chart: Vec<Value> = tab
                    .rows
                    .iter()
                    .map(|row| json!({"name": row.value, "value": row.count}))
                    .collect();
                Ok(json!({
                    "dimensions": [dim1.as_sql()],
                    "data": data,
                    "chartData": chart,
                    "total": tab.total,
                }))
            }
            Some(dim2) => {
                let (rows, total) = store
                    .query(move |conn| {
                        agg::two_dimension(conn, dim1.as_sql(), dim2.as_sql(), &filters)
                    })
                    .await?;
                let data: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        let mut object = serde_json::Map::with_capacity(3);
                        object.insert(
                            dim1.as_sql().to_string(),
                            Value::String(row.first.clone()),
                        );
                        object.insert(
                            dim2.as_sql().to_string(),
                            Value::String(row.second.clone()),
                        );
                        object.insert("count".to_string(), Value::from(row.count));
                        Value::Object(object)
                    })
                    .collect();
                let chart: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        json!({
                            "name": format!("{} / {}", row.first, row.second),
                            "value": row.count,
                        })
                    })
                    .collect();
                Ok(json!({
                    "dimensions": [dim1.as_sql(), dim2.as_sql()],
                    "data": data,
                    "chartData": chart,
                    "total": total,
                }))
            }
        }
    })
    .await
}

fn parse_dimension(raw: Option<&str>, name: &str) -> AppResult<Column> {
    let raw = raw
        .ok_or_else(|| AppError::BadRequest(format!("{} parameter is required", name)))?;
    Column::parse(raw)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown {} '{}'", name, raw)))
}

#[derive(Debug, Deserialize)]
pub struct TimeseriesParams {
    pub period: Option<String>,
    #[serde(rename = "groupBy")]
    pub group_by: Option<String>,
    pub filters: Option<String>,
}

/// `GET /api/datasets/{id}/timeseries`: counts bucketed by month or year,
/// optionally grouped. The unfiltered, ungrouped form reads
/// `monthly_stats`.
pub async fn timeseries(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TimeseriesParams>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    state.require_dataset(&id)?;
    let period = Period::parse(params.period.as_deref())?;
    let group_by = params
        .group_by
        .as_deref()
        .map(|raw| {
            Column::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown groupBy '{}'", raw)))
        })
        .transpose()?;
    let filters = Filters::parse(params.filters.as_deref())?;

    let store = state.store.clone();
    serve_cached(&state.stats_cache, &headers, &uri, async move {
        match group_by {
            None => {
                let fast = filters.is_empty();
                let points = store
                    .query(move |conn| {
                        if fast {
                            timeseries::series_fast(conn, period)
                        } else {
                            timeseries::series(conn, period, &filters, None)
                        }
                    })
                    .await?;
                let total: i64 = points.iter().map(|p| p.count).sum();
                let chart: Vec<Value> = clip_series(&points, period.chart_window())
                    .iter()
                    .map(|p| json!({"name": p.period, "value": p.count}))
                    .collect();
                Ok(json!({
                    "period": period.to_string(),
                    "groupBy": Value::Null,
                    "series": points,
                    "chartData": chart,
                    "total": total,
                }))
            }
            Some(group_by) => {
                let points = store
                    .query(move |conn| {
                        timeseries::grouped_series(conn, period, group_by, &filters)
                    })
                    .await?;
                let total: i64 = points.iter().map(|p| p.count).sum();
                let chart = clip_grouped(&points, period.chart_window());
                Ok(json!({
                    "period": period.to_string(),
                    "groupBy": group_by.as_sql(),
                    "series": points,
                    "chartData": chart,
                    "total": total,
                }))
            }
        }
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct InsightsParams {
    pub filters: Option<String>,
}

/// `GET /api/datasets/{id}/insights`: the market-insights composite.
pub async fn insights(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<InsightsParams>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    state.require_dataset(&id)?;
    let filters = Filters::parse(params.filters.as_deref())?;

    let store = state.store.clone();
    serve_cached(&state.stats_cache, &headers, &uri, async move {
        let result = store
            .query(move |conn| market_insights(conn, &filters))
            .await?;
        Ok(json!({
            "summary": {
                "totalTransactions": result.total,
                "dateRange": result.date_range,
                "monthlyAverage": result.monthly_average,
            },
            "trends": {
                "monthly": result.monthly,
                "yearlyGrowth": result.yearly_growth,
            },
            "distributions": {
                "propertyTypes": result.property_types,
                "transactionTypes": result.transaction_types,
                "representation": result.representation,
            },
        }))
    })
    .await
}
