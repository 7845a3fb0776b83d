use super::FeedRepository;
use crate::error::Result;
use crate::services::query::Query;
use common::jobs::ExecutionStatus;
use common::model::feed::ExecutedFeed;
use common::model::health::{FeedHealth, FeedStatus};
use common::requests::{ColumnFilter, OrderBy, Window};
use rusqlite::{params_from_iter, Connection};

const FINISHED: [ExecutionStatus; 4] = [
    ExecutionStatus::Completed,
    ExecutionStatus::Failed,
    ExecutionStatus::Stopped,
    ExecutionStatus::Abandoned,
];

impl FeedRepository {
    /// Health of every feed with recorded executions.
    pub fn feed_health_counts(&self) -> Result<Vec<FeedHealth>> {
        self.store.with_conn(|conn| health_counts(conn, &[]))
    }

    /// Health of one feed; empty when the feed never ran.
    pub fn feed_health_counts_for(&self, feed_name: &str) -> Result<Vec<FeedHealth>> {
        let filters = [ColumnFilter::eq("feedName", feed_name)];
        self.store.with_conn(|conn| health_counts(conn, &filters))
    }

    /// Health of the feeds whose executions match `filters`, with roll-up counts.
    pub fn feed_status_and_summary(&self, filters: &[ColumnFilter]) -> Result<FeedStatus> {
        let feeds = self.store.with_conn(|conn| health_counts(conn, filters))?;
        Ok(FeedStatus::from_health(feeds))
    }
}

fn health_counts(conn: &Connection, filters: &[ColumnFilter]) -> Result<Vec<FeedHealth>> {
    let (where_sql, params) = Query::<ExecutedFeed>::new().filters(filters).where_clause()?;
    let sql = format!(
        "SELECT feed_name,
                SUM(CASE WHEN status = '{completed}' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = '{failed}' THEN 1 ELSE 0 END),
                AVG(CASE WHEN start_time IS NOT NULL AND end_time IS NOT NULL THEN end_time - start_time END),
                MAX(CASE WHEN status = '{failed}' THEN COALESCE(end_time, start_time) END)
         FROM executed_feeds{where_sql}
         GROUP BY feed_name
         ORDER BY feed_name",
        completed = ExecutionStatus::Completed.as_str(),
        failed = ExecutionStatus::Failed.as_str(),
    );

    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<i64>>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let newest_first = [OrderBy::desc("startTime"), OrderBy::desc("feedExecutionId")];
    let finished = ColumnFilter::is_in("status", FINISHED.iter().map(|s| s.as_str()));

    let mut health = Vec::with_capacity(counts.len());
    for (feed, healthy_count, unhealthy_count, avg_runtime, last_unhealthy) in counts {
        let this_feed = ColumnFilter::eq("feedName", feed.as_str());
        let last_op_feed = Query::<ExecutedFeed>::new()
            .filters(filters)
            .filter(&this_feed)
            .order(&newest_first)
            .page(conn, Window::first(1))?
            .rows
            .into_iter()
            .next();
        let last_finished = Query::<ExecutedFeed>::new()
            .filters(filters)
            .filter(&this_feed)
            .filter(&finished)
            .order(&newest_first)
            .page(conn, Window::first(1))?
            .rows
            .into_iter()
            .next();

        health.push(FeedHealth {
            feed,
            healthy_count,
            unhealthy_count,
            last_op_feed,
            avg_runtime_millis: avg_runtime.map(|millis| millis.round() as i64),
            last_unhealthy_time: crate::db::from_millis(last_unhealthy),
            healthy: last_finished.map_or(true, |f| f.status != ExecutionStatus::Failed),
        });
    }
    Ok(health)
}
