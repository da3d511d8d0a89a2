pub mod agents;
pub mod datasets;
pub mod stats;
pub mod system;

pub use agents::*;
pub use datasets::*;
pub use stats::*;
pub use system::*;

use crate::error::{AppError, AppResult};

fn parse_int(raw: &str, name: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("{} must be an integer", name)))
}

/// `page` query parameter: default 1, must be >= 1.
pub(crate) fn page_param(raw: Option<&String>) -> AppResult<i64> {
    let page = match raw {
        Some(s) => parse_int(s, "page")?,
        None => 1,
    };
    if page < 1 {
        return Err(AppError::BadRequest("page must be >= 1".to_string()));
    }
    Ok(page)
}

/// `limit` query parameter bounded to `1..=max`.
pub(crate) fn limit_param(raw: Option<&String>, default: i64, max: i64) -> AppResult<i64> {
    let limit = match raw {
        Some(s) => parse_int(s, "limit")?,
        None => default,
    };
    if limit < 1 || limit > max {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            max
        )));
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_param() {
        assert_eq!(page_param(None).unwrap(), 1);
        assert_eq!(page_param(Some(&"3".to_string())).unwrap(), 3);
        assert!(page_param(Some(&"0".to_string())).is_err());
        assert!(page_param(Some(&"-2".to_string())).is_err());
        assert!(page_param(Some(&"abc".to_string())).is_err());
    }

    #[test]
    fn test_limit_param() {
        assert_eq!(limit_param(None, 50, 500).unwrap(), 50);
        assert_eq!(limit_param(Some(&"500".to_string()), 50, 500).unwrap(), 500);
        assert!(limit_param(Some(&"501".to_string()), 50, 500).is_err());
        assert!(limit_param(Some(&"0".to_string()), 50, 500).is_err());
    }
}
