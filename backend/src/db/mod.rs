//! SQLite-backed metadata store.
//!
//! `Store` owns a single connection behind a mutex and is shared (`Arc<Store>`) by the
//! feed repository and the datasource provider. Opening a store applies the schema.
//!
//! Besides the read paths used by the query core, the store exposes the ingestion write
//! path (`register_feed`, `link_feed`, `record_feed_execution`,
//! `record_job_execution`). Execution rows are immutable once written: re-recording the
//! same execution id replaces the snapshot wholesale.

mod schema;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use common::model::feed::{ExecutedFeed, ExecutedJob};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// Role of a datasource in a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedRole {
    Source,
    Destination,
}

impl FeedRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedRole::Source => "source",
            FeedRole::Destination => "destination",
        }
    }
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(config: &Config) -> Result<Self> {
        if config.is_in_memory() {
            Self::open_in_memory()
        } else {
            Self::open_path(&config.database)
        }
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening metadata store at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::StoreUnavailable("connection lock poisoned".to_string()))?;
        f(&conn)
    }

    /// Returns the id of the feed with this name, registering it first if needed.
    pub fn register_feed(&self, name: &str, active: bool) -> Result<String> {
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row("SELECT id FROM feeds WHERE name = ?1", params![name], |row| row.get(0))
                .optional()?;
            if let Some(id) = existing {
                conn.execute("UPDATE feeds SET active = ?1 WHERE id = ?2", params![active, id])?;
                return Ok(id);
            }
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO feeds (id, name, active) VALUES (?1, ?2, ?3)",
                params![id, name, active],
            )?;
            Ok(id)
        })
    }

    pub fn link_feed(&self, feed_id: &str, datasource_id: &str, role: FeedRole) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO feed_datasources (feed_id, datasource_id, role) VALUES (?1, ?2, ?3)",
                params![feed_id, datasource_id, role.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn record_feed_execution(&self, feed: &ExecutedFeed) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO executed_feeds
                    (feed_execution_id, feed_instance_id, feed_name, status, exit_code, exit_message, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    feed.feed_execution_id,
                    feed.feed_instance_id,
                    feed.feed_name,
                    feed.status.as_str(),
                    feed.exit_code,
                    feed.exit_message,
                    feed.start_time.map(to_millis),
                    feed.end_time.map(to_millis),
                ],
            )?;
            Ok(())
        })
    }

    pub fn record_job_execution(&self, job: &ExecutedJob) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO executed_jobs
                    (job_execution_id, job_instance_id, feed_execution_id, job_name, feed_name, status,
                     exit_code, exit_message, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    job.job_execution_id,
                    job.job_instance_id,
                    job.feed_execution_id,
                    job.job_name,
                    job.feed_name,
                    job.status.as_str(),
                    job.exit_code,
                    job.exit_message,
                    job.start_time.map(to_millis),
                    job.end_time.map(to_millis),
                ],
            )?;
            Ok(())
        })
    }
}

pub(crate) fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub(crate) fn from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}
