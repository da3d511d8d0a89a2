//! Filter parsing and WHERE-clause assembly.
//!
//! Filters arrive as one opaque query parameter holding a JSON object.
//! Keys must come from the filterable-column allow-list; values are a scalar
//! string or an array of strings. Conjunction across keys, disjunction
//! within an array. Values only ever reach SQL as bound parameters.

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::store::schema::Column;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterClause {
    Scalar(Column, String),
    AnyOf(Column, Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct Filters {
    clauses: Vec<FilterClause>,
}

impl Filters {
    /// Parse the `filters` query parameter. Absent (or blank) means no
    /// filter; anything malformed is an invalid-argument error.
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        let raw = match raw {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Ok(Self::default()),
        };

        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("Invalid filters JSON: {}", e)))?;
        let object = value.as_object().ok_or_else(|| {
            AppError::BadRequest("filters must be a JSON object".to_string())
        })?;

        let mut clauses = Vec::with_capacity(object.len());
        for (key, val) in object {
            let column = Column::parse(key).ok_or_else(|| {
                AppError::BadRequest(format!("Unknown filter key '{}'", key))
            })?;

            let clause = match val {
                Value::String(s) => FilterClause::Scalar(column, s.clone()),
                Value::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        let s = item.as_str().ok_or_else(|| {
                            AppError::BadRequest(format!(
                                "Filter values for '{}' must be strings",
                                key
                            ))
                        })?;
                        values.push(s.to_string());
                    }
                    FilterClause::AnyOf(column, values)
                }
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "Filter value for '{}' must be a string or array of strings",
                        key
                    )))
                }
            };
            clauses.push(clause);
        }

        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }
}

/// Assembles a WHERE clause from fixed conditions and parsed filters.
/// Column names come from the `Column` enum; every value binds as `?`.
#[derive(Debug, Default, Clone)]
pub struct WhereBuilder {
    conditions: Vec<String>,
    params: Vec<String>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition with no bound value.
    pub fn condition(&mut self, cond: impl Into<String>) -> &mut Self {
        self.conditions.push(cond.into());
        self
    }

    /// Add a condition containing exactly one `?` placeholder.
    pub fn condition_with(&mut self, cond: impl Into<String>, value: String) -> &mut Self {
        self.conditions.push(cond.into());
        self.params.push(value);
        self
    }

    /// Add a condition whose `?` placeholders bind the given values in order.
    pub fn condition_params(
        &mut self,
        cond: impl Into<String>,
        values: impl IntoIterator<Item = String>,
    ) -> &mut Self {
        self.conditions.push(cond.into());
        self.params.extend(values);
        self
    }

    pub fn filters(&mut self, filters: &Filters) -> &mut Self {
        for clause in filters.clauses() {
            match clause {
                FilterClause::Scalar(col, value) => {
                    self.conditions.push(format!("{} = ?", col.as_sql()));
                    self.params.push(value.clone());
                }
                FilterClause::AnyOf(_, values) if values.is_empty() => {
                    // Disjunction over the empty set matches nothing.
                    self.conditions.push("1 = 0".to_string());
                }
                FilterClause::AnyOf(col, values) => {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    self.conditions
                        .push(format!("{} IN ({})", col.as_sql(), placeholders));
                    self.params.extend(values.iter().cloned());
                }
            }
        }
        self
    }

    /// ` WHERE a AND b` with a leading space, or empty when unconstrained.
    pub fn clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }
}
