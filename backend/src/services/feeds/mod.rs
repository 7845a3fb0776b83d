//! # Feed Repository
//!
//! Read-only queries over executed feeds and jobs. Every operation takes the store
//! lock for the duration of one statement batch and never writes.
//!
//! ## Operations
//!
//! - Paged search: `find_feeds`, `find_jobs`, `data_tables_search_result` / `search` (user
//!   conditions ANDed with non-removable default filters, plus total/filtered counts).
//! - Single rows: `find_feed`, `find_feed_by_instance_id`, `find_last_completed_feed`.
//! - Projections: `select_distinct_column_values`, `select_count`, `unique_feed_names`,
//!   `feed_names`.
//! - Aggregates: `feed_health_counts`, `feed_status_and_summary` (see `health`) and
//!   `feed_status_count_by_day` (see `status`).

mod health;
mod status;

use crate::db::Store;
use crate::error::{Error, Result};
use crate::services::query::{self, Query, Record};
use common::jobs::ExecutionStatus;
use common::model::feed::{ExecutedFeed, ExecutedJob};
use common::model::search::{Page, SearchResult};
use common::requests::{ColumnFilter, FilterValue, OrderBy, SearchRequest, Window};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use std::sync::Arc;

pub use status::cutoff;

pub struct FeedRepository {
    store: Arc<Store>,
}

impl FeedRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// One window of executed feeds matching every filter, in the requested order.
    pub fn find_feeds(&self, conditions: &[ColumnFilter], order: &[OrderBy], window: Window) -> Result<Page<ExecutedFeed>> {
        self.store
            .with_conn(|conn| Query::<ExecutedFeed>::new().filters(conditions).order(order).page(conn, window))
    }

    pub fn find_jobs(&self, conditions: &[ColumnFilter], order: &[OrderBy], window: Window) -> Result<Page<ExecutedJob>> {
        self.store
            .with_conn(|conn| Query::<ExecutedJob>::new().filters(conditions).order(order).page(conn, window))
    }

    pub fn find_feed(&self, feed_execution_id: i64) -> Result<ExecutedFeed> {
        let filter = ColumnFilter::eq("feedExecutionId", feed_execution_id);
        self.store
            .with_conn(|conn| Query::<ExecutedFeed>::new().filter(&filter).all(conn))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("feed execution", feed_execution_id.to_string()))
    }

    pub fn find_feed_by_instance_id(&self, feed_instance_id: i64) -> Result<Vec<ExecutedFeed>> {
        let filter = ColumnFilter::eq("feedInstanceId", feed_instance_id);
        self.store
            .with_conn(|conn| Query::<ExecutedFeed>::new().filter(&filter).all(conn))
    }

    /// Most recent job executions of a feed, newest first.
    pub fn find_jobs_by_feed(&self, feed_name: &str, limit: usize) -> Result<Vec<ExecutedJob>> {
        let filter = ColumnFilter::eq("feedName", feed_name);
        let order = [OrderBy::desc("startTime"), OrderBy::desc("jobExecutionId")];
        let page = self.store.with_conn(|conn| {
            Query::<ExecutedJob>::new()
                .filter(&filter)
                .order(&order)
                .page(conn, Window::first(limit))
        })?;
        Ok(page.rows)
    }

    pub fn select_distinct_column_values(&self, filters: &[ColumnFilter], column: &str) -> Result<Vec<FilterValue>> {
        self.store
            .with_conn(|conn| Query::<ExecutedFeed>::new().filters(filters).distinct(conn, column))
    }

    pub fn select_count(&self, filters: &[ColumnFilter]) -> Result<i64> {
        self.store
            .with_conn(|conn| Query::<ExecutedFeed>::new().filters(filters).count(conn))
    }

    pub fn select_job_count(&self, filters: &[ColumnFilter]) -> Result<i64> {
        self.store
            .with_conn(|conn| Query::<ExecutedJob>::new().filters(filters).count(conn))
    }

    /// Data-tables search. `default_filters` scope the result (e.g. to one feed) and
    /// cannot be removed by the caller's `conditions`; `records_total` counts rows under
    /// the defaults alone.
    pub fn data_tables_search_result(
        &self,
        conditions: &[ColumnFilter],
        default_filters: &[ColumnFilter],
        order: &[OrderBy],
        window: Window,
    ) -> Result<SearchResult<ExecutedFeed>> {
        self.store
            .with_conn(|conn| query::search::<ExecutedFeed>(conn, conditions, default_filters, order, window))
    }

    /// `data_tables_search_result` driven by a deserialized request body.
    pub fn search(&self, request: &SearchRequest, default_filters: &[ColumnFilter]) -> Result<SearchResult<ExecutedFeed>> {
        self.data_tables_search_result(&request.conditions, default_filters, &request.order, request.window)
    }

    /// For every feed, its latest COMPLETED execution, restricted by `filters`.
    pub fn find_last_completed_feeds(&self, filters: &[ColumnFilter]) -> Result<Vec<ExecutedFeed>> {
        let (where_sql, mut params) = Query::<ExecutedFeed>::new().filters(filters).where_clause()?;
        let completed = ExecutionStatus::Completed.as_str();
        params.insert(0, Value::Text(completed.to_string()));
        params.insert(1, Value::Text(completed.to_string()));
        let sql = format!(
            "SELECT {select} FROM (
                SELECT f.* FROM executed_feeds f
                WHERE f.status = ?
                  AND NOT EXISTS (
                    SELECT 1 FROM executed_feeds g
                    WHERE g.feed_name = f.feed_name AND g.status = ?
                      AND (COALESCE(g.end_time, 0) > COALESCE(f.end_time, 0)
                           OR (COALESCE(g.end_time, 0) = COALESCE(f.end_time, 0)
                               AND g.feed_execution_id > f.feed_execution_id)))
            ){where_sql} ORDER BY feed_name",
            select = ExecutedFeed::SELECT,
        );
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| ExecutedFeed::from_row(row))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn find_last_completed_feed(&self, feed_name: &str) -> Result<Option<ExecutedFeed>> {
        let filter = [ColumnFilter::eq("feedName", feed_name)];
        Ok(self.find_last_completed_feeds(&filter)?.into_iter().next())
    }

    /// Names of feeds with at least one recorded execution.
    pub fn unique_feed_names(&self) -> Result<Vec<String>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT feed_name FROM executed_feeds ORDER BY feed_name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
    }

    /// Names of all registered feeds, executed or not.
    pub fn feed_names(&self) -> Result<Vec<String>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM feeds ORDER BY name")?;
            let names = stmt
                .query_map(params![], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
    }
}
