//! Immutable snapshots of past feed and job executions.
//!
//! Rows are written by the ingestion path and only ever read by the query core. A feed
//! execution groups one or more job executions; both carry their own status and
//! timestamps.

use crate::jobs::ExecutionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedFeed {
    pub feed_execution_id: i64,
    pub feed_instance_id: i64,
    pub feed_name: String,
    pub status: ExecutionStatus,
    pub exit_code: Option<String>,
    pub exit_message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedJob {
    pub job_execution_id: i64,
    pub job_instance_id: i64,
    pub feed_execution_id: i64,
    pub job_name: String,
    pub feed_name: String,
    pub status: ExecutionStatus,
    pub exit_code: Option<String>,
    pub exit_message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}
