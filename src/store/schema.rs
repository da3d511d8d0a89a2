//! Schema of the `transactions` table and the column allow-lists used to
//! validate client-supplied field names before any SQL is composed.

use serde_json::{json, Value};

/// Columns clients may filter or group by. Anything outside this set is
/// rejected before query composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    PropertyType,
    TransactionType,
    Represented,
    Town,
    District,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::PropertyType,
        Column::TransactionType,
        Column::Represented,
        Column::Town,
        Column::District,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "property_type" => Some(Column::PropertyType),
            "transaction_type" => Some(Column::TransactionType),
            "represented" => Some(Column::Represented),
            "town" => Some(Column::Town),
            "district" => Some(Column::District),
            _ => None,
        }
    }

    /// The column identifier as it appears in SQL. Values come from the
    /// closed enum, never from client input.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Column::PropertyType => "property_type",
            Column::TransactionType => "transaction_type",
            Column::Represented => "represented",
            Column::Town => "town",
            Column::District => "district",
        }
    }
}

/// Fields accepted by the single-field stats endpoint. A superset of the
/// filterable columns; `transaction_date` is deliberately absent (the
/// timeseries endpoint owns chronology).
pub fn statable_column(name: &str) -> Option<&'static str> {
    match name {
        "property_type" => Some("property_type"),
        "transaction_type" => Some("transaction_type"),
        "represented" => Some("represented"),
        "town" => Some("town"),
        "district" => Some("district"),
        "salesperson_name" => Some("salesperson_name"),
        "general_location" => Some("general_location"),
        _ => None,
    }
}

/// All columns of a transaction row, in storage order.
pub const ROW_COLUMNS: [&str; 9] = [
    "salesperson_name",
    "salesperson_reg_num",
    "transaction_date",
    "property_type",
    "transaction_type",
    "represented",
    "town",
    "district",
    "general_location",
];

/// Schema description served by the dataset metadata endpoint.
pub fn dataset_schema() -> Value {
    json!({
        "table": "transactions",
        "fields": [
            {"name": "salesperson_name", "type": "string", "description": "Display name of the licensed agent"},
            {"name": "salesperson_reg_num", "type": "string", "description": "Agent registration identifier"},
            {"name": "transaction_date", "type": "string", "description": "Month of transaction, MMM-YYYY"},
            {"name": "property_type", "type": "string", "description": "Category of property", "filterable": true},
            {"name": "transaction_type", "type": "string", "description": "Deal kind", "filterable": true},
            {"name": "represented", "type": "string", "description": "Principal represented", "filterable": true},
            {"name": "town", "type": "string", "description": "Town of the property", "filterable": true},
            {"name": "district", "type": "string", "description": "District of the property", "filterable": true},
            {"name": "general_location", "type": "string", "description": "General location of the property"}
        ],
        "sentinel": "-"
    })
}

/// Default chart recommendations for the dataset metadata endpoint, used
/// when the per-dataset snapshot does not carry its own.
pub fn visualization_recommendations() -> Value {
    json!([
        {"chart": "bar", "endpoint": "/analytics", "dimension": "property_type"},
        {"chart": "line", "endpoint": "/timeseries", "period": "month"},
        {"chart": "pie", "endpoint": "/stats", "field": "transaction_type"},
        {"chart": "table", "endpoint": "/agents/top"}
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_parse_roundtrip() {
        for col in Column::ALL {
            assert_eq!(Column::parse(col.as_sql()), Some(col));
        }
    }

    #[test]
    fn test_unknown_columns_rejected() {
        assert_eq!(Column::parse("salesperson_name"), None);
        assert_eq!(Column::parse("transaction_date"), None);
        assert_eq!(Column::parse("1=1; DROP TABLE transactions"), None);
    }

    #[test]
    fn test_statable_superset() {
        for col in Column::ALL {
            assert!(statable_column(col.as_sql()).is_some());
        }
        assert!(statable_column("salesperson_name").is_some());
        assert!(statable_column("transaction_date").is_none());
    }
}
