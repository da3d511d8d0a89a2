//! Cross-tab aggregation kernels and paginated row access.
//!
//! All kernels run against `transactions` with parameter-bound filters.
//! NULL and empty categorical values project to the literal `Unknown`;
//! ordering is count descending with value-ascending tie-breaks.

use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde_json::Value;

use crate::error::AppResult;
use crate::query::filter::{Filters, WhereBuilder};
use crate::store::schema::ROW_COLUMNS;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueCount {
    pub value: String,
    pub count: i64,
}

#[derive(Debug)]
pub struct CrossTab {
    pub rows: Vec<ValueCount>,
    pub unique_values: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairCount {
    pub first: String,
    pub second: String,
    pub count: i64,
}

#[derive(Debug)]
pub struct RowPage {
    pub rows: Vec<Value>,
    pub total: i64,
}

/// `col` projected with NULL/empty mapped to `Unknown`. `col` must come
/// from the schema allow-list, never from raw client input.
pub(crate) fn unknown_projection(col: &str) -> String {
    format!(
        "CASE WHEN {col} IS NULL OR {col} = '' THEN 'Unknown' ELSE {col} END",
        col = col
    )
}

fn as_sql_params(params: &[String]) -> Vec<&dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

/// Single-dimension cross-tab: grouped counts plus distinct-value and
/// post-filter totals. `exclude_sentinel` drops `-`/empty values entirely
/// (town semantics) instead of projecting them.
pub fn single_dimension(
    conn: &Connection,
    column: &str,
    filters: &Filters,
    limit: Option<i64>,
    exclude_sentinel: bool,
) -> AppResult<CrossTab> {
    let mut builder = WhereBuilder::new();
    if exclude_sentinel {
        builder.condition(format!(
            "{col} IS NOT NULL AND {col} NOT IN ('', '-')",
            col = column
        ));
    }
    builder.filters(filters);
    let clause = builder.clause();
    let projection = unknown_projection(column);

    let grouped_sql = format!(
        "SELECT {projection} AS value, COUNT(*) AS cnt
         FROM transactions{clause}
         GROUP BY value
         ORDER BY cnt DESC, value ASC{limit}",
        projection = projection,
        clause = clause,
        limit = match limit {
            Some(_) => " LIMIT ?",
            None => "",
        },
    );

    let mut params = as_sql_params(builder.params());
    if let Some(n) = &limit {
        params.push(n as &dyn ToSql);
    }

    let mut stmt = conn.prepare_cached(&grouped_sql)?;
    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(ValueCount {
                value: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let unique_sql = format!(
        "SELECT COUNT(DISTINCT {projection}) FROM transactions{clause}",
        projection = projection,
        clause = clause
    );
    let unique_values: i64 = conn.prepare_cached(&unique_sql)?.query_row(
        as_sql_params(builder.params()).as_slice(),
        |row| row.get(0),
    )?;

    let total = count_rows(conn, &builder)?;

    Ok(CrossTab {
        rows,
        unique_values,
        total,
    })
}

/// Two-dimension cross-tab ordered by count descending, then both values
/// ascending. Unknown projection applies to both dimensions.
pub fn two_dimension(
    conn: &Connection,
    first: &str,
    second: &str,
    filters: &Filters,
) -> AppResult<(Vec<PairCount>, i64)> {
    let mut builder = WhereBuilder::new();
    builder.filters(filters);
    let clause = builder.clause();

    let sql = format!(
        "SELECT {p1} AS v1, {p2} AS v2, COUNT(*) AS cnt
         FROM transactions{clause}
         GROUP BY v1, v2
         ORDER BY cnt DESC, v1 ASC, v2 ASC",
        p1 = unknown_projection(first),
        p2 = unknown_projection(second),
        clause = clause,
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(as_sql_params(builder.params()).as_slice(), |row| {
            Ok(PairCount {
                first: row.get(0)?,
                second: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let total = count_rows(conn, &builder)?;
    Ok((rows, total))
}

/// Post-filter row count via a separate COUNT(*) under the same WHERE.
pub fn count_rows(conn: &Connection, builder: &WhereBuilder) -> AppResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM transactions{}", builder.clause());
    let count = conn
        .prepare_cached(&sql)?
        .query_row(as_sql_params(builder.params()).as_slice(), |row| row.get(0))?;
    Ok(count)
}

/// One page of raw rows in insertion order, with the post-filter total.
/// `page` is 1-based and `limit` is already validated by the handler.
pub fn fetch_page(
    conn: &Connection,
    filters: &Filters,
    page: i64,
    limit: i64,
) -> AppResult<RowPage> {
    let mut builder = WhereBuilder::new();
    builder.filters(filters);
    let total = count_rows(conn, &builder)?;

    let sql = format!(
        "SELECT id, {cols} FROM transactions{clause} ORDER BY id ASC LIMIT ? OFFSET ?",
        cols = ROW_COLUMNS.join(", "),
        clause = builder.clause(),
    );

    let offset = (page - 1) * limit;
    let mut params = as_sql_params(builder.params());
    params.push(&limit as &dyn ToSql);
    params.push(&offset as &dyn ToSql);

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), |row| {
            let mut object = serde_json::Map::with_capacity(ROW_COLUMNS.len() + 1);
            object.insert("id".to_string(), Value::from(row.get::<_, i64>(0)?));
            for (i, col) in ROW_COLUMNS.iter().enumerate() {
                let value: Option<String> = row.get(i + 1)?;
                object.insert(
                    (*col).to_string(),
                    value.map(Value::String).unwrap_or(Value::Null),
                );
            }
            Ok(Value::Object(object))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RowPage { rows, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::seeded_conn;

    #[test]
    fn test_single_dimension_orders_by_count_then_value() {
        let conn = seeded_conn();
        let tab =
            single_dimension(&conn, "property_type", &Filters::default(), None, false).unwrap();
        assert_eq!(tab.total, 3);
        assert_eq!(tab.unique_values, 2);
        assert_eq!(
            tab.rows,
            vec![
                ValueCount {
                    value: "HDB".to_string(),
                    count: 2
                },
                ValueCount {
                    value: "CONDOMINIUM_APARTMENTS".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_single_dimension_respects_filters() {
        let conn = seeded_conn();
        let filters = Filters::parse(Some(r#"{"represented":"BUYER"}"#)).unwrap();
        let tab = single_dimension(&conn, "property_type", &filters, None, false).unwrap();
        assert_eq!(tab.total, 2);
        assert_eq!(tab.rows.len(), 2);
        assert!(tab.rows.iter().all(|r| r.count == 1));
    }

    #[test]
    fn test_two_dimension_tie_break_is_lexicographic() {
        let conn = seeded_conn();
        let (rows, total) =
            two_dimension(&conn, "property_type", "represented", &Filters::default()).unwrap();
        assert_eq!(total, 3);
        // All pairs have count 1, so order is (dim1, dim2) ascending.
        assert_eq!(
            rows,
            vec![
                PairCount {
                    first: "CONDOMINIUM_APARTMENTS".to_string(),
                    second: "BUYER".to_string(),
                    count: 1
                },
                PairCount {
                    first: "HDB".to_string(),
                    second: "BUYER".to_string(),
                    count: 1
                },
                PairCount {
                    first: "HDB".to_string(),
                    second: "SELLER".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_pagination_has_no_gaps_or_duplicates() {
        let conn = seeded_conn();
        let first = fetch_page(&conn, &Filters::default(), 1, 2).unwrap();
        let second = fetch_page(&conn, &Filters::default(), 2, 2).unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.rows.len(), 2);
        assert_eq!(second.rows.len(), 1);

        let mut ids: Vec<i64> = first
            .rows
            .iter()
            .chain(second.rows.iter())
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_page_beyond_total_is_empty() {
        let conn = seeded_conn();
        let page = fetch_page(&conn, &Filters::default(), 5, 50).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total, 3);
    }
}
