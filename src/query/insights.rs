//! Market-insights composite: totals, date range, distributions, monthly
//! average, and year-over-year growth, all honoring the request filters.

use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::error::AppResult;
use crate::query::agg::{count_rows, single_dimension};
use crate::query::filter::{Filters, WhereBuilder};
use crate::query::period::{month_number_expr, month_period_expr, Period, DATE_PRESENT};
use crate::query::timeseries::{series, SeriesPoint};
use crate::query::{percentage, DateRange, Distribution};

#[derive(Debug)]
pub struct MarketInsights {
    pub total: i64,
    pub date_range: Option<DateRange>,
    pub property_types: Vec<Distribution>,
    pub transaction_types: Vec<Distribution>,
    pub representation: Vec<Distribution>,
    pub monthly: Vec<SeriesPoint>,
    pub monthly_average: i64,
    pub yearly_growth: String,
}

pub fn market_insights(conn: &Connection, filters: &Filters) -> AppResult<MarketInsights> {
    let mut builder = WhereBuilder::new();
    builder.filters(filters);
    let total = count_rows(conn, &builder)?;

    let property_types = distribution(conn, "property_type", filters, total)?;
    let transaction_types = distribution(conn, "transaction_type", filters, total)?;
    let representation = distribution(conn, "represented", filters, total)?;

    let monthly = series(conn, Period::Month, filters, None)?;
    let monthly_average = mean_rounded(&monthly);
    let yearly_growth = yearly_growth(&monthly);
    let date_range = date_range(conn, filters, None)?;

    Ok(MarketInsights {
        total,
        date_range,
        property_types,
        transaction_types,
        representation,
        monthly,
        monthly_average,
        yearly_growth,
    })
}

/// Full single-dimension distribution with shares of `whole`.
pub fn distribution(
    conn: &Connection,
    column: &str,
    filters: &Filters,
    whole: i64,
) -> AppResult<Vec<Distribution>> {
    let tab = single_dimension(conn, column, filters, None, false)?;
    Ok(tab
        .rows
        .into_iter()
        .map(|row| Distribution {
            percentage: percentage(row.count, whole),
            value: row.value,
            count: row.count,
        })
        .collect())
}

/// First and last non-sentinel transaction dates under the given scope,
/// in original `MMM-YYYY` form. None when no dated rows match.
pub fn date_range(
    conn: &Connection,
    filters: &Filters,
    reg_num: Option<&str>,
) -> AppResult<Option<DateRange>> {
    let mut builder = WhereBuilder::new();
    builder
        .condition(DATE_PRESENT)
        .condition(format!("{} IS NOT NULL", month_number_expr()));
    if let Some(reg) = reg_num {
        builder.condition_with("salesperson_reg_num = ?", reg.to_string());
    }
    builder.filters(filters);

    let endpoint = |direction: &str| -> AppResult<Option<String>> {
        let sql = format!(
            "SELECT transaction_date FROM transactions{clause}
             ORDER BY {period} {direction} LIMIT 1",
            clause = builder.clause(),
            period = month_period_expr(),
            direction = direction,
        );
        let params: Vec<&dyn ToSql> = builder.params().iter().map(|p| p as &dyn ToSql).collect();
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut rows = stmt.query_map(params.as_slice(), |row| row.get::<_, String>(0))?;
        Ok(rows.next().transpose()?)
    };

    match (endpoint("ASC")?, endpoint("DESC")?) {
        (Some(from), Some(to)) => Ok(Some(DateRange { from, to })),
        _ => Ok(None),
    }
}

/// Arithmetic mean of per-period counts, rounded to the nearest integer.
fn mean_rounded(monthly: &[SeriesPoint]) -> i64 {
    if monthly.is_empty() {
        return 0;
    }
    let sum: i64 = monthly.iter().map(|p| p.count).sum();
    (sum as f64 / monthly.len() as f64).round() as i64
}

/// `(last year − previous year) / previous year × 100` to one decimal with
/// a trailing `%`. Fewer than two years, or a zero denominator, is `0%`.
fn yearly_growth(monthly: &[SeriesPoint]) -> String {
    let mut years: Vec<(String, i64)> = Vec::new();
    for point in monthly {
        let year = point.period[..4].to_string();
        match years.last_mut() {
            Some((y, count)) if *y == year => *count += point.count,
            _ => years.push((year, point.count)),
        }
    }
    if years.len() < 2 {
        return "0%".to_string();
    }
    let (_, last) = &years[years.len() - 1];
    let (_, prev) = &years[years.len() - 2];
    if *prev == 0 {
        return "0%".to_string();
    }
    let growth = (*last - *prev) as f64 * 100.0 / *prev as f64;
    format!("{:.1}%", (growth * 10.0).round() / 10.0)
}
