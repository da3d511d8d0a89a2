//! Time-series bucketing over `transaction_date`.
//!
//! Rows with sentinel or unparseable dates are excluded. Output is sorted
//! ascending by the normalized period, which is chronological.

use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::error::AppResult;
use crate::query::agg::unknown_projection;
use crate::query::filter::{Filters, WhereBuilder};
use crate::query::period::{month_number_expr, Period, DATE_PRESENT};
use crate::store::schema::Column;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SeriesPoint {
    pub period: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GroupedPoint {
    pub period: String,
    pub value: String,
    pub count: i64,
}

fn date_valid_builder() -> WhereBuilder {
    let mut builder = WhereBuilder::new();
    builder
        .condition(DATE_PRESENT)
        .condition(format!("{} IS NOT NULL", month_number_expr()));
    builder
}

/// Plain series against `transactions`, optionally scoped to one agent.
pub fn series(
    conn: &Connection,
    period: Period,
    filters: &Filters,
    reg_num: Option<&str>,
) -> AppResult<Vec<SeriesPoint>> {
    let mut builder = date_valid_builder();
    if let Some(reg) = reg_num {
        builder.condition_with("salesperson_reg_num = ?", reg.to_string());
    }
    builder.filters(filters);

    let sql = format!(
        "SELECT {bucket} AS period, COUNT(*) AS cnt
         FROM transactions{clause}
         GROUP BY period
         ORDER BY period ASC",
        bucket = period.bucket_expr(),
        clause = builder.clause(),
    );

    let params: Vec<&dyn ToSql> = builder.params().iter().map(|p| p as &dyn ToSql).collect();
    let mut stmt = conn.prepare_cached(&sql)?;
    let points = stmt
        .query_map(params.as_slice(), |row| {
            Ok(SeriesPoint {
                period: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Fast path: the plain series aggregated from `monthly_stats`.
pub fn series_fast(conn: &Connection, period: Period) -> AppResult<Vec<SeriesPoint>> {
    let sql = match period {
        Period::Month => {
            "SELECT period, SUM(count) FROM monthly_stats
             GROUP BY period ORDER BY period ASC"
        }
        Period::Year => {
            "SELECT substr(period, 1, 4) AS year, SUM(count) FROM monthly_stats
             GROUP BY year ORDER BY year ASC"
        }
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let points = stmt
        .query_map([], |row| {
            Ok(SeriesPoint {
                period: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

/// One row per `(period, group value)`, ascending by period then value.
/// NULL/empty group values project to `Unknown`.
pub fn grouped_series(
    conn: &Connection,
    period: Period,
    group_by: Column,
    filters: &Filters,
) -> AppResult<Vec<GroupedPoint>> {
    let mut builder = date_valid_builder();
    builder.filters(filters);

    let sql = format!(
        "SELECT {bucket} AS period, {projection} AS value, COUNT(*) AS cnt
         FROM transactions{clause}
         GROUP BY period, value
         ORDER BY period ASC, value ASC",
        bucket = period.bucket_expr(),
        projection = unknown_projection(group_by.as_sql()),
        clause = builder.clause(),
    );

    let params: Vec<&dyn ToSql> = builder.params().iter().map(|p| p as &dyn ToSql).collect();
    let mut stmt = conn.prepare_cached(&sql)?;
    let points = stmt
        .query_map(params.as_slice(), |row| {
            Ok(GroupedPoint {
                period: row.get(0)?,
                value: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Trailing `window` entries of a plain series.
pub fn clip_series(points: &[SeriesPoint], window: usize) -> Vec<SeriesPoint> {
    let start = points.len().saturating_sub(window);
    points[start..].to_vec()
}

/// Entries belonging to the trailing `window` distinct periods.
pub fn clip_grouped(points: &[GroupedPoint], window: usize) -> Vec<GroupedPoint> {
    let mut periods: Vec<&str> = points.iter().map(|p| p.period.as_str()).collect();
    periods.dedup();
    let start = periods.len().saturating_sub(window);
    let keep = &periods[start..];
    let first = keep.first().copied();
    match first {
        None => Vec::new(),
        // Points arrive period-ascending, so the tail is contiguous.
        Some(first) => points
            .iter()
            .skip_while(|p| p.period.as_str() < first)
            .cloned()
            .collect(),
    }
}
