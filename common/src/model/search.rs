use serde::{Deserialize, Serialize};

/// One window of a query result.
///
/// `next_available` is true when at least one more row matches beyond this window, so a
/// caller can page forward without issuing a separate count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub next_available: bool,
}

/// Result of a data-tables search.
///
/// `records_total` counts the rows visible under the default (system) filters alone;
/// `records_filtered` additionally applies the user conditions. `data` is the requested
/// window of the filtered rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub data: Vec<T>,
    pub records_total: i64,
    pub records_filtered: i64,
}
