//! Error types for feed manager operations.
//!
//! Public operations return `crate::error::Result<T>` with a structured `Error`. The
//! variants follow how a caller is expected to react:
//! - `InvalidFilter`: the request itself is wrong; never retried.
//! - `NotFound`: nothing to return, as opposed to a failure.
//! - `Cipher`: a secret could not be encrypted or decrypted. During projection this is
//!   scoped to the single field (see `Projection::field_errors`); on write it aborts the
//!   whole operation so no partial secret is ever persisted.
//! - `Sync`: the controller-service API failed. It carries the state the remote
//!   resource was left in so the caller can decide whether to retry.

use crate::cipher::CipherError;
use crate::services::data_sources::sync::SyncFailure;
use common::requests::FilterError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// Unknown column, bad operator arity or a value that does not fit the column.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The record cannot take the requested shape, e.g. a name already used by another
    /// datasource.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The datasource kind has no write path.
    #[error("unsupported datasource: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Sync(#[from] SyncFailure),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The store connection is unusable, e.g. its lock was poisoned by a panic.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
