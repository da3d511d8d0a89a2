//! Agent-level roll-ups.
//!
//! The top-agents listing is a two-stage pattern: select the top-L
//! registration numbers first, then resolve each agent's leading
//! property type, transaction type, representation, and town with four
//! batched window queries joined in memory. Per-agent queries are never
//! issued.

use std::collections::HashMap;

use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::query::agg::unknown_projection;
use crate::query::filter::{Filters, WhereBuilder};
use crate::query::insights::date_range;
use crate::query::timeseries::{series, SeriesPoint};
use crate::query::{percentage, DateRange, Distribution};
use crate::query::period::Period;

/// Rows with a usable registration number.
const REG_PRESENT: &str =
    "salesperson_reg_num IS NOT NULL AND salesperson_reg_num NOT IN ('', '-')";

/// A leading value and its count, serialized as `["HDB", 2]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopValue(pub String, pub i64);

#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    #[serde(rename = "regNum")]
    pub reg_num: String,
    pub name: String,
    #[serde(rename = "totalTransactions")]
    pub total_transactions: i64,
    #[serde(rename = "topPropertyType")]
    pub top_property_type: Option<TopValue>,
    #[serde(rename = "topTransactionType")]
    pub top_transaction_type: Option<TopValue>,
    #[serde(rename = "topRepresented")]
    pub top_represented: Option<TopValue>,
    #[serde(rename = "topTown")]
    pub top_town: Option<TopValue>,
}

#[derive(Debug, Serialize)]
pub struct TopAgentsStats {
    #[serde(rename = "topAgentMarketShare")]
    pub top_agent_market_share: f64,
    #[serde(rename = "top10MarketShare")]
    pub top10_market_share: f64,
}

#[derive(Debug, Serialize)]
pub struct TopAgents {
    pub total: i64,
    pub agents: Vec<AgentSummary>,
    pub statistics: TopAgentsStats,
}

#[derive(Debug, Serialize)]
pub struct AgentBasic {
    pub name: String,
    #[serde(rename = "regNum")]
    pub reg_num: String,
    #[serde(rename = "totalTransactions")]
    pub total_transactions: i64,
}

#[derive(Debug, Serialize)]
pub struct AgentProfile {
    pub agent: AgentBasic,
    #[serde(rename = "dateRange")]
    pub date_range: Option<DateRange>,
    #[serde(rename = "propertyTypes")]
    pub property_types: Vec<Distribution>,
    #[serde(rename = "transactionTypes")]
    pub transaction_types: Vec<Distribution>,
    pub representation: Vec<Distribution>,
    #[serde(rename = "topTowns")]
    pub top_towns: Vec<Distribution>,
    #[serde(rename = "monthlyActivity")]
    pub monthly_activity: Vec<SeriesPoint>,
}

/// Escape LIKE metacharacters so a literal `%`/`_` in the search term
/// cannot widen the match. Paired with `ESCAPE '\'`.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub fn top_agents(
    conn: &Connection,
    limit: i64,
    filters: &Filters,
    search: Option<&str>,
) -> AppResult<TopAgents> {
    let fast = filters.is_empty() && search.is_none();
    let (ranked, total) = if fast {
        ranked_fast(conn, limit)?
    } else {
        ranked_slow(conn, limit, filters, search)?
    };

    let regs: Vec<String> = ranked.iter().map(|(reg, _, _)| reg.clone()).collect();
    let top_property = top_value_per_agent(conn, &regs, "property_type", false, filters)?;
    let top_transaction = top_value_per_agent(conn, &regs, "transaction_type", false, filters)?;
    let top_represented = top_value_per_agent(conn, &regs, "represented", false, filters)?;
    let top_town = top_value_per_agent(conn, &regs, "town", true, filters)?;

    let agents: Vec<AgentSummary> = ranked
        .into_iter()
        .map(|(reg_num, name, count)| AgentSummary {
            top_property_type: top_property.get(&reg_num).cloned(),
            top_transaction_type: top_transaction.get(&reg_num).cloned(),
            top_represented: top_represented.get(&reg_num).cloned(),
            top_town: top_town.get(&reg_num).cloned(),
            reg_num,
            name,
            total_transactions: count,
        })
        .collect();

    let pool: i64 = agents.iter().map(|a| a.total_transactions).sum();
    let top_agent_market_share =
        percentage(agents.first().map(|a| a.total_transactions).unwrap_or(0), pool);
    let top10: i64 = agents.iter().take(10).map(|a| a.total_transactions).sum();
    let top10_market_share = percentage(top10, pool);

    Ok(TopAgents {
        total,
        agents,
        statistics: TopAgentsStats {
            top_agent_market_share,
            top10_market_share,
        },
    })
}

/// Fast path: the pre-computed `top_agents` table.
fn ranked_fast(conn: &Connection, limit: i64) -> AppResult<(Vec<(String, String, i64)>, i64)> {
    let mut stmt = conn.prepare_cached(
        "SELECT reg_num, name, total_transactions FROM top_agents
         ORDER BY total_transactions DESC, reg_num ASC LIMIT ?",
    )?;
    let ranked = stmt
        .query_map([limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let total: i64 = conn
        .prepare_cached("SELECT COUNT(*) FROM top_agents")?
        .query_row([], |row| row.get(0))?;
    Ok((ranked, total))
}

/// Slow path: group against `transactions`, honoring filters and search.
fn ranked_slow(
    conn: &Connection,
    limit: i64,
    filters: &Filters,
    search: Option<&str>,
) -> AppResult<(Vec<(String, String, i64)>, i64)> {
    let mut builder = WhereBuilder::new();
    builder.condition(REG_PRESENT);
    if let Some(term) = search {
        let pattern = like_pattern(term);
        builder.condition_params(
            "(salesperson_name LIKE ? ESCAPE '\\' OR salesperson_reg_num LIKE ? ESCAPE '\\')",
            [pattern.clone(), pattern],
        );
    }
    builder.filters(filters);

    let sql = format!(
        "SELECT salesperson_reg_num AS reg_num, MAX(salesperson_name) AS name,
                COUNT(*) AS cnt
         FROM transactions{clause}
         GROUP BY reg_num
         ORDER BY cnt DESC, reg_num ASC
         LIMIT ?",
        clause = builder.clause(),
    );
    let mut params: Vec<&dyn ToSql> = builder.params().iter().map(|p| p as &dyn ToSql).collect();
    params.push(&limit as &dyn ToSql);

    let mut stmt = conn.prepare_cached(&sql)?;
    let ranked = stmt
        .query_map(params.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let count_sql = format!(
        "SELECT COUNT(DISTINCT salesperson_reg_num) FROM transactions{clause}",
        clause = builder.clause(),
    );
    let total: i64 = conn.prepare_cached(&count_sql)?.query_row(
        builder
            .params()
            .iter()
            .map(|p| p as &dyn ToSql)
            .collect::<Vec<_>>()
            .as_slice(),
        |row| row.get(0),
    )?;
    Ok((ranked, total))
}

/// One batched window query: the highest-count value of `column` for every
/// agent in `regs`, in a single pass. Ties on count resolve by value
/// ascending.
fn top_value_per_agent(
    conn: &Connection,
    regs: &[String],
    column: &str,
    exclude_sentinel: bool,
    filters: &Filters,
) -> AppResult<HashMap<String, TopValue>> {
    if regs.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder = WhereBuilder::new();
    let placeholders = vec!["?"; regs.len()].join(", ");
    builder.condition_params(
        format!("salesperson_reg_num IN ({})", placeholders),
        regs.iter().cloned(),
    );
    if exclude_sentinel {
        builder.condition(format!(
            "{col} IS NOT NULL AND {col} NOT IN ('', '-')",
            col = column
        ));
    }
    builder.filters(filters);

    let projection = if exclude_sentinel {
        column.to_string()
    } else {
        unknown_projection(column)
    };

    let sql = format!(
        "SELECT reg_num, value, cnt FROM (
             SELECT salesperson_reg_num AS reg_num, {projection} AS value,
                    COUNT(*) AS cnt,
                    ROW_NUMBER() OVER (
                        PARTITION BY salesperson_reg_num
                        ORDER BY COUNT(*) DESC, {projection} ASC
                    ) AS rank
             FROM transactions{clause}
             GROUP BY reg_num, value
         ) WHERE rank = 1",
        projection = projection,
        clause = builder.clause(),
    );

    let params: Vec<&dyn ToSql> = builder.params().iter().map(|p| p as &dyn ToSql).collect();
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params.as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            TopValue(row.get(1)?, row.get(2)?),
        ))
    })?;

    let mut map = HashMap::with_capacity(regs.len());
    for row in rows {
        let (reg, top) = row?;
        map.insert(reg, top);
    }
    Ok(map)
}

/// Full profile for one registration number.
pub fn agent_profile(conn: &Connection, reg_num: &str) -> AppResult<AgentProfile> {
    let (name, total): (Option<String>, i64) = conn
        .prepare_cached(
            "SELECT MAX(salesperson_name), COUNT(*) FROM transactions
             WHERE salesperson_reg_num = ?",
        )?
        .query_row([reg_num], |row| Ok((row.get(0)?, row.get(1)?)))?;
    if total == 0 {
        return Err(AppError::AgentNotFound);
    }

    let property_types = scoped_breakdown(conn, reg_num, "property_type", false, None, total)?;
    let transaction_types =
        scoped_breakdown(conn, reg_num, "transaction_type", false, None, total)?;
    let representation = scoped_breakdown(conn, reg_num, "represented", false, None, total)?;
    let top_towns = scoped_breakdown(conn, reg_num, "town", true, Some(10), total)?;
    let monthly_activity = series(conn, Period::Month, &Filters::default(), Some(reg_num))?;
    let date_range = date_range(conn, &Filters::default(), Some(reg_num))?;

    Ok(AgentProfile {
        agent: AgentBasic {
            name: name.unwrap_or_default(),
            reg_num: reg_num.to_string(),
            total_transactions: total,
        },
        date_range,
        property_types,
        transaction_types,
        representation,
        top_towns,
        monthly_activity,
    })
}

/// Breakdown of one column within a single agent's transactions, with
/// shares of the agent's total.
fn scoped_breakdown(
    conn: &Connection,
    reg_num: &str,
    column: &str,
    exclude_sentinel: bool,
    limit: Option<i64>,
    total: i64,
) -> AppResult<Vec<Distribution>> {
    let mut builder = WhereBuilder::new();
    builder.condition_with("salesperson_reg_num = ?", reg_num.to_string());
    if exclude_sentinel {
        builder.condition(format!(
            "{col} IS NOT NULL AND {col} NOT IN ('', '-')",
            col = column
        ));
    }

    let projection = if exclude_sentinel {
        column.to_string()
    } else {
        unknown_projection(column)
    };

    let sql = format!(
        "SELECT {projection} AS value, COUNT(*) AS cnt
         FROM transactions{clause}
         GROUP BY value
         ORDER BY cnt DESC, value ASC{limit}",
        projection = projection,
        clause = builder.clause(),
        limit = match limit {
            Some(_) => " LIMIT ?",
            None => "",
        },
    );

    let mut params: Vec<&dyn ToSql> = builder.params().iter().map(|p| p as &dyn ToSql).collect();
    if let Some(n) = &limit {
        params.push(n as &dyn ToSql);
    }

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|(value, count)| Distribution {
            percentage: percentage(count, total),
            value,
            count,
        })
        .collect())
}
