//! Queryable columns of the execution tables.

use super::{Column, ColumnKind, Record};
use crate::db::from_millis;
use common::jobs::ExecutionStatus;
use common::model::feed::{ExecutedFeed, ExecutedJob};
use rusqlite::Row;

fn status(label: String) -> ExecutionStatus {
    label.parse().unwrap_or(ExecutionStatus::Unknown)
}

impl Record for ExecutedFeed {
    const TABLE: &'static str = "executed_feeds";
    const SELECT: &'static str = "feed_execution_id, feed_instance_id, feed_name, status, exit_code, \
                                  exit_message, start_time, end_time";
    const KEY: &'static str = "feed_execution_id";
    const COLUMNS: &'static [Column] = &[
        Column::new("feedExecutionId", "feed_execution_id", ColumnKind::Integer),
        Column::new("feedInstanceId", "feed_instance_id", ColumnKind::Integer),
        Column::new("feedName", "feed_name", ColumnKind::Text),
        Column::new("status", "status", ColumnKind::Status),
        Column::new("exitCode", "exit_code", ColumnKind::Text),
        Column::new("startTime", "start_time", ColumnKind::Timestamp),
        Column::new("endTime", "end_time", ColumnKind::Timestamp),
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ExecutedFeed {
            feed_execution_id: row.get(0)?,
            feed_instance_id: row.get(1)?,
            feed_name: row.get(2)?,
            status: status(row.get(3)?),
            exit_code: row.get(4)?,
            exit_message: row.get(5)?,
            start_time: from_millis(row.get(6)?),
            end_time: from_millis(row.get(7)?),
        })
    }
}

impl Record for ExecutedJob {
    const TABLE: &'static str = "executed_jobs";
    const SELECT: &'static str = "job_execution_id, job_instance_id, feed_execution_id, job_name, feed_name, \
                                  status, exit_code, exit_message, start_time, end_time";
    const KEY: &'static str = "job_execution_id";
    const COLUMNS: &'static [Column] = &[
        Column::new("jobExecutionId", "job_execution_id", ColumnKind::Integer),
        Column::new("jobInstanceId", "job_instance_id", ColumnKind::Integer),
        Column::new("feedExecutionId", "feed_execution_id", ColumnKind::Integer),
        Column::new("jobName", "job_name", ColumnKind::Text),
        Column::new("feedName", "feed_name", ColumnKind::Text),
        Column::new("status", "status", ColumnKind::Status),
        Column::new("exitCode", "exit_code", ColumnKind::Text),
        Column::new("startTime", "start_time", ColumnKind::Timestamp),
        Column::new("endTime", "end_time", ColumnKind::Timestamp),
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ExecutedJob {
            job_execution_id: row.get(0)?,
            job_instance_id: row.get(1)?,
            feed_execution_id: row.get(2)?,
            job_name: row.get(3)?,
            feed_name: row.get(4)?,
            status: status(row.get(5)?),
            exit_code: row.get(6)?,
            exit_message: row.get(7)?,
            start_time: from_millis(row.get(8)?),
            end_time: from_millis(row.get(9)?),
        })
    }
}
