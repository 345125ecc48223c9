//! Shared paging, sorting and term filtering for catalog list queries.
//!
//! Sorting is expressed with bound parameters inside static SQL
//! (`ORDER BY CASE ?col WHEN ...`), so the requested column is never
//! spliced into the statement text.

use serde::Deserialize;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A sort column that has been checked against a store's allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderColumn(&'static str);

impl OrderColumn {
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

/// Query-string parameters accepted by every list endpoint.
///
/// Parent filters that do not apply to the listed entity are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub term: Option<String>,
    pub order_by: Option<String>,
    #[serde(default)]
    pub dir: SortDirection,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub country_id: Option<i64>,
    pub region_id: Option<i64>,
    pub location_type_id: Option<i64>,
    pub activity_type_id: Option<i64>,
    pub activity_id: Option<i64>,
}

impl ListQuery {
    /// Resolve `order_by` against `allowed`. The first allowed column is the
    /// default. Returns `None` for a column outside the list.
    pub fn order_column(&self, allowed: &[&'static str]) -> Option<OrderColumn> {
        match self.order_by.as_deref() {
            None | Some("") => allowed.first().copied().map(OrderColumn),
            Some(requested) => allowed
                .iter()
                .find(|c| **c == requested)
                .copied()
                .map(OrderColumn),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Trimmed search term, `None` when blank.
    pub fn term(&self) -> Option<&str> {
        self.term.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}
