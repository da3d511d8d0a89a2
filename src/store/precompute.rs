//! Build-time materialization of the aggregate tables.
//!
//! Runs once after the loader has populated `transactions`: drops and
//! recreates the five aggregate tables inside a single transaction, builds
//! their indexes, stamps the metadata table, and refreshes planner
//! statistics. Re-runnable from a full `transactions` table at any time.

use rusqlite::Connection;

use crate::error::AppResult;
use crate::query::agg::unknown_projection;
use crate::query::period::{month_number_expr, month_period_expr, DATE_PRESENT};

const TOWN_PRESENT: &str = "town IS NOT NULL AND town NOT IN ('', '-')";

#[derive(Debug, Default)]
pub struct PrecomputeReport {
    pub top_agents: usize,
    pub monthly_stats: usize,
    pub property_type_stats: usize,
    pub transaction_type_stats: usize,
    pub town_stats: usize,
}

pub fn run(conn: &mut Connection) -> AppResult<PrecomputeReport> {
    let tx = conn.transaction()?;
    let mut report = PrecomputeReport::default();

    // The loader only guarantees table contents; make sure the query
    // indexes exist before anything reads at volume.
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_tx_date ON transactions(transaction_date);
         CREATE INDEX IF NOT EXISTS idx_tx_property_type ON transactions(property_type);
         CREATE INDEX IF NOT EXISTS idx_tx_transaction_type ON transactions(transaction_type);
         CREATE INDEX IF NOT EXISTS idx_tx_reg_num ON transactions(salesperson_reg_num);
         CREATE INDEX IF NOT EXISTS idx_tx_town ON transactions(town);
         CREATE INDEX IF NOT EXISTS idx_tx_district ON transactions(district);
         CREATE INDEX IF NOT EXISTS idx_tx_represented ON transactions(represented);
         CREATE INDEX IF NOT EXISTS idx_tx_agent_rollup ON transactions(
             salesperson_reg_num, property_type, transaction_type, represented, town);
         CREATE INDEX IF NOT EXISTS idx_tx_timeseries ON transactions(
             transaction_date, property_type, transaction_type);",
    )?;

    tx.execute_batch(
        "DROP TABLE IF EXISTS top_agents;
         CREATE TABLE top_agents (
             reg_num TEXT PRIMARY KEY,
             name TEXT,
             total_transactions INTEGER NOT NULL,
             last_transaction TEXT
         );",
    )?;
    report.top_agents = tx.execute(
        &format!(
            "INSERT INTO top_agents (reg_num, name, total_transactions, last_transaction)
             SELECT t.salesperson_reg_num, MAX(t.salesperson_name), COUNT(*),
                    (SELECT t2.transaction_date FROM transactions t2
                     WHERE t2.salesperson_reg_num = t.salesperson_reg_num
                       AND t2.transaction_date IS NOT NULL
                       AND t2.transaction_date NOT IN ('', '-')
                     ORDER BY {period} DESC LIMIT 1)
             FROM transactions t
             WHERE t.salesperson_reg_num IS NOT NULL
               AND t.salesperson_reg_num NOT IN ('', '-')
             GROUP BY t.salesperson_reg_num",
            period = month_period_expr(),
        ),
        [],
    )?;
    tx.execute_batch(
        "CREATE INDEX idx_top_agents_total ON top_agents(total_transactions DESC);",
    )?;

    tx.execute_batch(
        "DROP TABLE IF EXISTS monthly_stats;
         CREATE TABLE monthly_stats (
             period TEXT NOT NULL,
             property_type TEXT,
             transaction_type TEXT,
             count INTEGER NOT NULL
         );",
    )?;
    report.monthly_stats = tx.execute(
        &format!(
            "INSERT INTO monthly_stats (period, property_type, transaction_type, count)
             SELECT {period} AS period, property_type, transaction_type, COUNT(*)
             FROM transactions
             WHERE {present} AND {month} IS NOT NULL
             GROUP BY period, property_type, transaction_type",
            period = month_period_expr(),
            present = DATE_PRESENT,
            month = month_number_expr(),
        ),
        [],
    )?;
    tx.execute_batch("CREATE INDEX idx_monthly_stats_period ON monthly_stats(period);")?;

    report.property_type_stats =
        rebuild_share_table(&tx, "property_type_stats", "property_type", None)?;
    report.transaction_type_stats =
        rebuild_share_table(&tx, "transaction_type_stats", "transaction_type", None)?;
    report.town_stats = rebuild_share_table(&tx, "town_stats", "town", Some(TOWN_PRESENT))?;

    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('last_updated', ?1)",
        [chrono::Utc::now().to_rfc3339()],
    )?;

    // Refresh planner statistics while the aggregates are still hot.
    tx.execute_batch("ANALYZE")?;
    tx.commit()?;
    Ok(report)
}

/// Rebuild one `<name>(value, count, percentage)` table. Percentages are
/// rounded to two decimals; with a `scope`, both the rows and the
/// denominator are restricted to rows matching it.
fn rebuild_share_table(
    tx: &rusqlite::Transaction<'_>,
    table: &str,
    column: &str,
    scope: Option<&str>,
) -> AppResult<usize> {
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} (
             {column} TEXT,
             count INTEGER NOT NULL,
             percentage REAL
         );",
        table = table,
        column = column,
    ))?;

    let where_clause = scope.map(|s| format!(" WHERE {}", s)).unwrap_or_default();
    let projection = match scope {
        // Scoped tables drop the sentinel instead of projecting it.
        Some(_) => column.to_string(),
        None => unknown_projection(column),
    };
    let inserted = tx.execute(
        &format!(
            "INSERT INTO {table} ({column}, count, percentage)
             SELECT {projection} AS value, COUNT(*),
                    ROUND(COUNT(*) * 100.0 /
                          (SELECT COUNT(*) FROM transactions{where_clause}), 2)
             FROM transactions{where_clause}
             GROUP BY value",
            table = table,
            column = column,
            projection = projection,
            where_clause = where_clause,
        ),
        [],
    )?;
    Ok(inserted)
}
