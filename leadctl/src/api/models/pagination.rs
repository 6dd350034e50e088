//! Shared pagination types for API query parameters.
//!
//! Every list endpoint uses offset-based pagination with `limit` and `offset` parameters and
//! answers with `{items, total, pages}`, where `pages = ceil(total / limit)`.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Standard pagination parameters for list endpoints.
///
/// The `limit` is clamped to `1..=MAX_LIMIT`; a negative `offset` is treated as 0. An offset
/// past the end of the result set is not an error, it just yields an empty page.
#[serde_as]
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Maximum number of items to return (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,

    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub offset: Option<i64>,
}

impl Pagination {
    #[inline]
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Paginated list wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// The items for the current page
    pub items: Vec<T>,
    /// Total number of items matching the filters
    pub total: i64,
    /// Number of pages of `limit` items needed to hold `total`
    pub pages: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        let limit = pagination.limit();
        Self {
            items,
            total,
            pages: page_count(total, limit),
            limit,
            offset: pagination.offset(),
        }
    }
}

/// `ceil(total / limit)` for non-negative totals and positive limits.
pub fn page_count(total: i64, limit: i64) -> i64 {
    if total <= 0 { 0 } else { (total + limit - 1) / limit }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let p = Pagination::default();
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn test_limit_clamping() {
        let p = Pagination {
            limit: Some(0),
            offset: None,
        };
        assert_eq!(p.limit(), 1);

        let p = Pagination {
            limit: Some(1000),
            offset: None,
        };
        assert_eq!(p.limit(), MAX_LIMIT);

        let p = Pagination {
            limit: Some(-3),
            offset: Some(-10),
        };
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_page_count_is_ceiling() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(100, 1), 100);
    }

    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    struct Item {
        id: i64,
    }

    #[test]
    fn test_response_metadata() {
        let p = Pagination {
            limit: Some(10),
            offset: Some(40),
        };
        let page: PaginatedResponse<Item> = PaginatedResponse::new(vec![], 23, &p);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 23);
        assert_eq!(page.pages, 3);
        assert_eq!(page.offset, 40);
        assert_eq!(page.limit, 10);
    }

    #[test]
    fn test_query_string_parsing() {
        let p: Pagination = serde_json::from_value(serde_json::json!({"limit": "25", "offset": "50"})).unwrap();
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 50);
    }
}
