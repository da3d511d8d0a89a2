//! Period normalization for `MMM-YYYY` transaction dates.
//!
//! Dates stay raw strings in the store; chronology is computed on demand.
//! Lexicographic order on the raw form does not match chronological order,
//! so every chronological operation goes through `YYYY-MM` (or `YYYY`).

use std::fmt;

use crate::error::{AppError, AppResult};

pub const MONTHS: [(&str, &str); 12] = [
    ("JAN", "01"),
    ("FEB", "02"),
    ("MAR", "03"),
    ("APR", "04"),
    ("MAY", "05"),
    ("JUN", "06"),
    ("JUL", "07"),
    ("AUG", "08"),
    ("SEP", "09"),
    ("OCT", "10"),
    ("NOV", "11"),
    ("DEC", "12"),
];

/// WHERE fragment selecting rows with a usable transaction date.
pub const DATE_PRESENT: &str =
    "transaction_date IS NOT NULL AND transaction_date NOT IN ('', '-')";

/// SQL expression mapping the leading month token to its two-digit number.
/// NULL for anything outside the fixed table.
pub fn month_number_expr() -> String {
    let mut expr = String::from("CASE substr(transaction_date, 1, 3)");
    for (name, num) in MONTHS {
        expr.push_str(&format!(" WHEN '{}' THEN '{}'", name, num));
    }
    expr.push_str(" END");
    expr
}

/// SQL expression producing the `YYYY-MM` bucket of `transaction_date`.
pub fn month_period_expr() -> String {
    format!(
        "substr(transaction_date, 5, 4) || '-' || {}",
        month_number_expr()
    )
}

/// SQL expression producing the `YYYY` bucket.
pub const YEAR_EXPR: &str = "substr(transaction_date, 5, 4)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Month,
    Year,
}

impl Period {
    /// Parse the `period` query parameter; absent defaults to month.
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw {
            None | Some("month") => Ok(Period::Month),
            Some("year") => Ok(Period::Year),
            Some(other) => Err(AppError::BadRequest(format!(
                "period must be 'month' or 'year', got '{}'",
                other
            ))),
        }
    }

    pub fn bucket_expr(&self) -> String {
        match self {
            Period::Month => month_period_expr(),
            Period::Year => YEAR_EXPR.to_string(),
        }
    }

    /// How many trailing periods the chart view keeps.
    pub fn chart_window(&self) -> usize {
        match self {
            Period::Month => 24,
            Period::Year => 36,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month => write!(f, "month"),
            Period::Year => write!(f, "year"),
        }
    }
}

pub fn is_present(date: &str) -> bool {
    !date.is_empty() && date != "-"
}

/// `OCT-2017` → `2017-10`. None for sentinel, absent, or malformed input.
pub fn to_month_period(date: &str) -> Option<String> {
    if !is_present(date) {
        return None;
    }
    let (month, rest) = date.split_at(date.len().min(3));
    let year = rest.strip_prefix('-')?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let num = MONTHS.iter().find(|(name, _)| *name == month)?.1;
    Some(format!("{}-{}", year, num))
}

/// `OCT-2017` → `2017`.
pub fn to_year(date: &str) -> Option<String> {
    to_month_period(date).map(|p| p[..4].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_table_covers_the_year() {
        assert_eq!(to_month_period("JAN-2024").as_deref(), Some("2024-01"));
        assert_eq!(to_month_period("JUN-2024").as_deref(), Some("2024-06"));
        assert_eq!(to_month_period("DEC-1999").as_deref(), Some("1999-12"));
    }

    #[test]
    fn test_sentinel_and_malformed_dates_excluded() {
        assert_eq!(to_month_period("-"), None);
        assert_eq!(to_month_period(""), None);
        assert_eq!(to_month_period("XXX-2024"), None);
        assert_eq!(to_month_period("JAN2024"), None);
        assert_eq!(to_month_period("JAN-24"), None);
    }

    #[test]
    fn test_year_bucket() {
        assert_eq!(to_year("OCT-2017").as_deref(), Some("2017"));
        assert_eq!(to_year("-"), None);
    }

    #[test]
    fn test_normalized_order_is_chronological() {
        // Lexicographic on the raw form would put APR-2018 before OCT-2017.
        let a = to_month_period("OCT-2017").unwrap();
        let b = to_month_period("APR-2018").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_period_parse() {
        assert_eq!(Period::parse(None).unwrap(), Period::Month);
        assert_eq!(Period::parse(Some("month")).unwrap(), Period::Month);
        assert_eq!(Period::parse(Some("year")).unwrap(), Period::Year);
        assert!(Period::parse(Some("week")).is_err());
    }

    #[test]
    fn test_sql_month_expr_mentions_every_month() {
        let expr = month_number_expr();
        for (name, num) in MONTHS {
            assert!(expr.contains(&format!("WHEN '{}' THEN '{}'", name, num)));
        }
    }
}
