//! The remote controller-service API, seen from the feed manager.
//!
//! A controller service is an externally managed connection pool identified by an opaque
//! id. Its lifecycle is independent of the local datasource record, which only keeps
//! the id: every read goes through `ControllerServices::find_by_id` and the service may
//! disappear out-of-band at any time.
//!
//! The API is blocking. The one exception is `spawn_disable_and_delete`, a detached
//! best-effort cleanup whose result nobody observes.

pub mod state;

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Controller-service type of a JDBC connection pool.
pub const DBCP_CONNECTION_POOL: &str = "org.apache.nifi.dbcp.DBCPConnectionPool";

pub const DATABASE_CONNECTION_URL: &str = "Database Connection URL";
pub const DATABASE_DRIVER_CLASS_NAME: &str = "Database Driver Class Name";
pub const DATABASE_DRIVER_LOCATION: &str = "database-driver-locations";
pub const DATABASE_USER: &str = "Database User";
pub const PASSWORD: &str = "Password";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("controller service '{0}' not found")]
    NotFound(String),

    #[error("controller service API unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Enabled,
    Disabled,
}

/// What to create, or what to merge into an existing service on update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerServiceSpec {
    pub service_type: String,
    pub name: String,
    pub comments: Option<String>,
    pub properties: BTreeMap<String, String>,
}

/// A controller service as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerService {
    pub id: String,
    pub service_type: String,
    pub name: String,
    pub comments: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub state: ServiceState,
}

impl ControllerService {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

pub trait ControllerServices: Send + Sync {
    /// `Ok(None)` when no service has this id.
    fn find_by_id(&self, id: &str) -> Result<Option<ControllerService>, RemoteError>;

    /// Creates a disabled service and assigns its id.
    fn create(&self, spec: &ControllerServiceSpec) -> Result<ControllerService, RemoteError>;

    /// Merges `spec` into the service: name and comments are replaced, properties
    /// absent from `spec` keep their current value. Fails while the service is enabled.
    fn update(&self, id: &str, spec: &ControllerServiceSpec) -> Result<ControllerService, RemoteError>;

    fn update_state_by_id(&self, id: &str, state: ServiceState) -> Result<ControllerService, RemoteError>;

    /// Disables then deletes the service, blocking until both are done.
    fn disable_and_delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// Requests deletion of a service on a detached thread and returns immediately.
///
/// Errors discarded: the outcome is only logged at debug level and never reaches the
/// caller. A service that survives this is an orphan, which is acceptable.
pub fn spawn_disable_and_delete(services: Arc<dyn ControllerServices>, id: String) {
    let spawned = thread::Builder::new()
        .name(format!("cleanup-{}", id))
        .spawn(move || {
            if let Err(e) = services.disable_and_delete(&id) {
                debug!("Discarded cleanup failure for controller service {}: {}", id, e);
            }
        });
    if let Err(e) = spawned {
        debug!("Could not start cleanup thread: {}", e);
    }
}
