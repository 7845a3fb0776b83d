//! # Controller Service Synchronization
//!
//! Keeps the remote connection pool of a JDBC datasource in step with the local record.
//! The two stores cannot be updated atomically, so every write follows a fixed order and
//! a failure reports how far it got.
//!
//! ## Workflow
//!
//! 1. **Linked record**: disable the service, merge the set properties into it, enable it
//!    again. A service reported missing at any of the three steps is treated as if it had
//!    never existed and the write continues with step 2.
//! 2. **Unlinked record** (or missing service): create a new service from the full
//!    property set, then enable it.
//! 3. **Enable failure after create**: the new service is handed to a detached cleanup
//!    (`spawn_disable_and_delete`) and the failure is returned. The record keeps its old
//!    link so the write can be retried.
//!
//! A service left disabled after a failed re-enable is not re-enabled automatically:
//! the properties just written may be the reason it cannot start.

use super::domain::DatasourceId;
use crate::controller::{
    spawn_disable_and_delete, ControllerServiceSpec, ControllerServices, RemoteError, ServiceState,
};
use crate::error::Result;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where a failed synchronization left the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Disable failed; the service still runs with its old properties.
    NotDisabled { service_id: String },
    /// Disabled, but the update failed; old properties, service stopped.
    DisabledNotUpdated { service_id: String },
    /// Updated, but could not be enabled again; the service is left disabled.
    UpdatedNotEnabled { service_id: String },
    NotCreated,
    /// Created but never enabled; cleanup was requested in the background.
    CreatedNotEnabled { service_id: String },
}

impl SyncState {
    pub fn service_id(&self) -> Option<&str> {
        match self {
            SyncState::NotDisabled { service_id }
            | SyncState::DisabledNotUpdated { service_id }
            | SyncState::UpdatedNotEnabled { service_id }
            | SyncState::CreatedNotEnabled { service_id } => Some(service_id),
            SyncState::NotCreated => None,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::NotDisabled { service_id } => write!(f, "service {} not disabled", service_id),
            SyncState::DisabledNotUpdated { service_id } => {
                write!(f, "service {} disabled but not updated", service_id)
            }
            SyncState::UpdatedNotEnabled { service_id } => {
                write!(f, "service {} updated but left disabled", service_id)
            }
            SyncState::NotCreated => f.write_str("no service created"),
            SyncState::CreatedNotEnabled { service_id } => {
                write!(f, "service {} created but not enabled", service_id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to synchronize datasource {datasource_id} ({state}): {source}")]
pub struct SyncFailure {
    pub datasource_id: String,
    pub state: SyncState,
    #[source]
    pub source: RemoteError,
}

/// One write to synchronize.
#[derive(Debug, Clone)]
pub struct SyncRequest<'a> {
    pub datasource_id: DatasourceId,
    /// Service the record currently points at, if any.
    pub linked_service_id: Option<&'a str>,
    pub name: &'a str,
    pub comments: Option<&'a str>,
    /// Only the properties set on this write; merged into a linked service.
    pub properties: &'a BTreeMap<String, String>,
}

pub struct ControllerServiceSync {
    services: Arc<dyn ControllerServices>,
    service_type: String,
}

enum LinkedOutcome {
    Updated,
    Missing,
}

impl ControllerServiceSync {
    pub fn new(services: Arc<dyn ControllerServices>, service_type: impl Into<String>) -> Self {
        Self {
            services,
            service_type: service_type.into(),
        }
    }

    /// Brings the remote service in line with `request` and returns the id of the
    /// service the record should point at afterwards.
    ///
    /// # Arguments
    ///
    /// * `request` - the write being synchronized.
    /// * `create_properties` - full property set for a new service. Only called when a
    ///   service has to be created; an error from it aborts before anything is created.
    ///
    /// # Returns
    ///
    /// The linked id (unchanged when the update path succeeded, new otherwise), or
    /// `Error::Sync` naming the state the remote service was left in.
    pub fn sync(
        &self,
        request: &SyncRequest<'_>,
        create_properties: impl FnOnce() -> Result<BTreeMap<String, String>>,
    ) -> Result<String> {
        if let Some(service_id) = request.linked_service_id {
            match self.update_linked(request, service_id)? {
                LinkedOutcome::Updated => {
                    debug!("Controller service {} updated for datasource {}", service_id, request.name);
                    return Ok(service_id.to_string());
                }
                LinkedOutcome::Missing => {
                    warn!(
                        "Controller service {} of datasource {} no longer exists; creating a replacement",
                        service_id, request.name
                    );
                }
            }
        }
        let properties = create_properties()?;
        self.create_and_enable(request, properties)
    }

    fn spec(&self, request: &SyncRequest<'_>, properties: BTreeMap<String, String>) -> ControllerServiceSpec {
        ControllerServiceSpec {
            service_type: self.service_type.clone(),
            name: request.name.to_string(),
            comments: request.comments.map(str::to_string),
            properties,
        }
    }

    fn failure(&self, request: &SyncRequest<'_>, state: SyncState, source: RemoteError) -> SyncFailure {
        SyncFailure {
            datasource_id: request.datasource_id.to_string(),
            state,
            source,
        }
    }

    fn update_linked(&self, request: &SyncRequest<'_>, service_id: &str) -> Result<LinkedOutcome> {
        let owned = || service_id.to_string();

        debug!("Disabling controller service {}", service_id);
        match self.services.update_state_by_id(service_id, ServiceState::Disabled) {
            Ok(_) => {}
            Err(RemoteError::NotFound(_)) => return Ok(LinkedOutcome::Missing),
            Err(e) => {
                return Err(self
                    .failure(request, SyncState::NotDisabled { service_id: owned() }, e)
                    .into())
            }
        }

        debug!("Updating controller service {}", service_id);
        let spec = self.spec(request, request.properties.clone());
        match self.services.update(service_id, &spec) {
            Ok(_) => {}
            Err(RemoteError::NotFound(_)) => return Ok(LinkedOutcome::Missing),
            Err(e) => {
                return Err(self
                    .failure(request, SyncState::DisabledNotUpdated { service_id: owned() }, e)
                    .into())
            }
        }

        debug!("Enabling controller service {}", service_id);
        match self.services.update_state_by_id(service_id, ServiceState::Enabled) {
            Ok(_) => Ok(LinkedOutcome::Updated),
            Err(RemoteError::NotFound(_)) => Ok(LinkedOutcome::Missing),
            Err(e) => {
                error!("Controller service {} left disabled: {}", service_id, e);
                Err(self
                    .failure(request, SyncState::UpdatedNotEnabled { service_id: owned() }, e)
                    .into())
            }
        }
    }

    fn create_and_enable(&self, request: &SyncRequest<'_>, properties: BTreeMap<String, String>) -> Result<String> {
        let created = self
            .services
            .create(&self.spec(request, properties))
            .map_err(|e| self.failure(request, SyncState::NotCreated, e))?;
        debug!("Created controller service {} for datasource {}", created.id, request.name);

        if let Err(e) = self.services.update_state_by_id(&created.id, ServiceState::Enabled) {
            error!(
                "Could not enable controller service {} for datasource {}: {}",
                created.id, request.name, e
            );
            spawn_disable_and_delete(Arc::clone(&self.services), created.id.clone());
            return Err(self
                .failure(request, SyncState::CreatedNotEnabled { service_id: created.id }, e)
                .into());
        }

        info!("Datasource {} linked to controller service {}", request.name, created.id);
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::InMemoryControllerServices;
    use crate::error::Error;

    fn properties(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn request<'a>(linked: Option<&'a str>, props: &'a BTreeMap<String, String>) -> SyncRequest<'a> {
        SyncRequest {
            datasource_id: DatasourceId::new(),
            linked_service_id: linked,
            name: "pg1",
            comments: None,
            properties: props,
        }
    }

    #[test]
    fn unlinked_write_creates_an_enabled_service() {
        let registry = InMemoryControllerServices::new();
        let sync = ControllerServiceSync::new(Arc::new(registry.clone()), "pool");
        let props = properties(&[("Database User", "u")]);

        let id = sync.sync(&request(None, &props), || Ok(props.clone())).unwrap();

        let service = registry.find_by_id(&id).unwrap().unwrap();
        assert_eq!(service.state, ServiceState::Enabled);
        assert_eq!(service.property("Database User"), Some("u"));
    }

    #[test]
    fn linked_write_keeps_the_id_and_merges() {
        let registry = InMemoryControllerServices::new();
        let sync = ControllerServiceSync::new(Arc::new(registry.clone()), "pool");
        let initial = properties(&[("Database User", "u"), ("Password", "p")]);
        let id = sync.sync(&request(None, &initial), || Ok(initial.clone())).unwrap();

        let change = properties(&[("Database User", "v")]);
        let same = sync
            .sync(&request(Some(&id), &change), || panic!("must not create"))
            .unwrap();

        assert_eq!(same, id);
        let service = registry.find_by_id(&id).unwrap().unwrap();
        assert_eq!(service.property("Database User"), Some("v"));
        assert_eq!(service.property("Password"), Some("p"));
        assert_eq!(service.state, ServiceState::Enabled);
    }

    #[test]
    fn missing_linked_service_is_replaced() {
        let registry = InMemoryControllerServices::new();
        let sync = ControllerServiceSync::new(Arc::new(registry.clone()), "pool");
        let props = properties(&[("Database User", "u")]);

        let id = sync
            .sync(&request(Some("gone"), &props), || Ok(props.clone()))
            .unwrap();

        assert_ne!(id, "gone");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn create_properties_error_aborts_before_create() {
        let registry = InMemoryControllerServices::new();
        let sync = ControllerServiceSync::new(Arc::new(registry.clone()), "pool");
        let props = BTreeMap::new();

        let err = sync
            .sync(&request(None, &props), || Err(Error::unsupported("nope")))
            .unwrap_err();

        assert!(matches!(err, Error::Unsupported(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn state_reports_the_affected_service() {
        let state = SyncState::UpdatedNotEnabled {
            service_id: "cs-1".to_string(),
        };
        assert_eq!(state.service_id(), Some("cs-1"));
        assert_eq!(state.to_string(), "service cs-1 updated but left disabled");
        assert_eq!(SyncState::NotCreated.service_id(), None);
    }
}
