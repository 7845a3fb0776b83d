use super::FeedRepository;
use crate::db::to_millis;
use crate::error::Result;
use chrono::{DateTime, Duration, Months, Utc};
use common::jobs::ExecutionStatus;
use common::model::health::{DatePart, JobStatusCount};
use rusqlite::params;

/// `strftime` pattern naming the bucket an execution falls into.
fn bucket_format(date_part: DatePart) -> &'static str {
    match date_part {
        DatePart::Hour => "%Y-%m-%d %H:00",
        DatePart::Day => "%Y-%m-%d",
        DatePart::Week => "%Y-W%W",
        DatePart::Month => "%Y-%m",
        DatePart::Year => "%Y",
    }
}

/// Start of the trailing window of `interval` units ending at `now`.
pub fn cutoff(now: DateTime<Utc>, date_part: DatePart, interval: u32) -> DateTime<Utc> {
    let earliest = match date_part {
        DatePart::Hour => now.checked_sub_signed(Duration::hours(interval as i64)),
        DatePart::Day => now.checked_sub_signed(Duration::days(interval as i64)),
        DatePart::Week => now.checked_sub_signed(Duration::weeks(interval as i64)),
        DatePart::Month => now.checked_sub_months(Months::new(interval)),
        DatePart::Year => now.checked_sub_months(Months::new(interval.saturating_mul(12))),
    };
    earliest.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl FeedRepository {
    /// Execution counts of `feed_name` per status and time bucket over the trailing
    /// `interval` units. Buckets without executions are omitted, not zero-filled.
    pub fn feed_status_count_by_day(
        &self,
        feed_name: &str,
        date_part: DatePart,
        interval: u32,
    ) -> Result<Vec<JobStatusCount>> {
        self.feed_status_counts_since(feed_name, date_part, cutoff(Utc::now(), date_part, interval))
    }

    /// Same as `feed_status_count_by_day` with an explicit window start.
    pub fn feed_status_counts_since(
        &self,
        feed_name: &str,
        date_part: DatePart,
        since: DateTime<Utc>,
    ) -> Result<Vec<JobStatusCount>> {
        let sql = format!(
            "SELECT strftime('{format}', start_time / 1000, 'unixepoch') AS bucket, status, COUNT(*)
             FROM executed_feeds
             WHERE feed_name = ?1 AND start_time >= ?2
             GROUP BY bucket, status
             ORDER BY bucket, status",
            format = bucket_format(date_part),
        );
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let counts = stmt
                .query_map(params![feed_name, to_millis(since)], |row| {
                    let status: String = row.get(1)?;
                    Ok(JobStatusCount {
                        bucket: row.get(0)?,
                        feed_name: feed_name.to_string(),
                        status: status.parse().unwrap_or(ExecutionStatus::Unknown),
                        count: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(counts)
        })
    }
}
