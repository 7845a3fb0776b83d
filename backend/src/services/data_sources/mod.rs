//! Datasource records and their remote connection pools.
//!
//! - `domain`: the locally persisted record.
//! - `provider`: lookup, get-or-create and save of records.
//! - `transform`: leveled projection to the external view, and the write path back.
//! - `sync`: the disable/update/enable and create/enable protocol against the
//!   controller service.

pub mod domain;
pub mod provider;
pub mod sync;
pub mod transform;

pub use domain::{DatasourceId, DatasourceRecord, KindTag, LinkState};
pub use provider::{DatasourceProvider, SqliteDatasourceProvider};
pub use sync::{ControllerServiceSync, SyncFailure, SyncState};
pub use transform::{DatasourceModelTransform, FieldError, Projection};
