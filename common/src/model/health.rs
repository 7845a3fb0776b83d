//! Aggregate views derived on demand from executed feed rows. None of these are
//! persisted.

use crate::jobs::ExecutionStatus;
use crate::model::feed::ExecutedFeed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health summary of a single feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedHealth {
    pub feed: String,
    /// Number of COMPLETED executions.
    pub healthy_count: i64,
    /// Number of FAILED executions.
    pub unhealthy_count: i64,
    /// Most recent execution, whatever its status.
    pub last_op_feed: Option<ExecutedFeed>,
    pub avg_runtime_millis: Option<i64>,
    pub last_unhealthy_time: Option<DateTime<Utc>>,
    /// The most recent finished execution did not fail.
    pub healthy: bool,
}

/// Health of a set of feeds plus the roll-up counts shown on a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub feeds: Vec<FeedHealth>,
    pub healthy_count: usize,
    pub failed_count: usize,
    /// Healthy feeds as a whole percentage of all feeds; 0 when there are none.
    pub percent: u8,
}

impl FeedStatus {
    pub fn from_health(feeds: Vec<FeedHealth>) -> Self {
        let healthy_count = feeds.iter().filter(|f| f.healthy).count();
        let failed_count = feeds.len() - healthy_count;
        let percent = if feeds.is_empty() {
            0
        } else {
            ((healthy_count * 100) as f64 / feeds.len() as f64).round() as u8
        };
        Self {
            feeds,
            healthy_count,
            failed_count,
            percent,
        }
    }

    pub fn failed_feeds(&self) -> impl Iterator<Item = &FeedHealth> {
        self.feeds.iter().filter(|f| !f.healthy)
    }
}

/// Time unit used to bucket executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatePart {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Number of executions of one feed with a given status inside one time bucket.
///
/// `bucket` is the formatted start of the bucket (`2024-03-05` for days,
/// `2024-03-05 14:00` for hours, `2024-W09` for weeks, `2024-03` for months, `2024` for
/// years) and sorts chronologically as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusCount {
    pub bucket: String,
    pub feed_name: String,
    pub status: ExecutionStatus,
    pub count: i64,
}
