pub mod agents;
pub mod agg;
pub mod filter;
pub mod insights;
pub mod period;
pub mod timeseries;

use serde::Serialize;

pub use filter::{FilterClause, Filters, WhereBuilder};
pub use period::Period;

/// A categorical value with its count and share, percentages to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub value: String,
    pub count: i64,
    pub percentage: f64,
}

/// First and last observed transaction dates, in original `MMM-YYYY` form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

/// Integer share as a float rounded to one decimal; zero denominator is 0.0.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}
