//! In-process controller-service registry.
//!
//! `InMemoryControllerServices` implements `ControllerServices` over a shared map and
//! enforces the same rules as the remote API:
//! - new services start `Disabled`,
//! - properties cannot change while a service is `Enabled`,
//! - updates merge properties instead of replacing them.
//!
//! It is used when the feed manager runs without a remote controller, and as the base
//! of test doubles.

use super::{ControllerService, ControllerServiceSpec, ControllerServices, RemoteError, ServiceState};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// A clonable, thread-safe controller-service registry. Clones share the same map.
#[derive(Clone, Default)]
pub struct InMemoryControllerServices {
    services: Arc<RwLock<HashMap<String, ControllerService>>>,
}

impl InMemoryControllerServices {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, ControllerService>>, RemoteError> {
        self.services
            .read()
            .map_err(|_| RemoteError::Unavailable("controller registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, ControllerService>>, RemoteError> {
        self.services
            .write()
            .map_err(|_| RemoteError::Unavailable("controller registry lock poisoned".to_string()))
    }

    /// Deletes a service without any state checks, as an operator would out-of-band.
    pub fn remove(&self, id: &str) -> Option<ControllerService> {
        self.write().ok().and_then(|mut services| services.remove(id))
    }

    pub fn len(&self) -> usize {
        self.read().map(|services| services.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ControllerServices for InMemoryControllerServices {
    fn find_by_id(&self, id: &str) -> Result<Option<ControllerService>, RemoteError> {
        Ok(self.read()?.get(id).cloned())
    }

    fn create(&self, spec: &ControllerServiceSpec) -> Result<ControllerService, RemoteError> {
        let service = ControllerService {
            id: Uuid::new_v4().to_string(),
            service_type: spec.service_type.clone(),
            name: spec.name.clone(),
            comments: spec.comments.clone(),
            properties: spec.properties.clone(),
            state: ServiceState::Disabled,
        };
        self.write()?.insert(service.id.clone(), service.clone());
        Ok(service)
    }

    fn update(&self, id: &str, spec: &ControllerServiceSpec) -> Result<ControllerService, RemoteError> {
        let mut services = self.write()?;
        let service = services
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if service.state == ServiceState::Enabled {
            return Err(RemoteError::Unavailable(format!(
                "controller service '{}' must be disabled before it is updated",
                id
            )));
        }
        service.name = spec.name.clone();
        service.comments = spec.comments.clone();
        for (key, value) in &spec.properties {
            service.properties.insert(key.clone(), value.clone());
        }
        Ok(service.clone())
    }

    fn update_state_by_id(&self, id: &str, state: ServiceState) -> Result<ControllerService, RemoteError> {
        let mut services = self.write()?;
        let service = services
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        service.state = state;
        Ok(service.clone())
    }

    fn disable_and_delete(&self, id: &str) -> Result<(), RemoteError> {
        self.write()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec(properties: &[(&str, &str)]) -> ControllerServiceSpec {
        ControllerServiceSpec {
            service_type: "pool".to_string(),
            name: "pg1".to_string(),
            comments: None,
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn created_services_start_disabled() {
        let registry = InMemoryControllerServices::new();
        let created = registry.create(&spec(&[("a", "1")])).unwrap();
        assert_eq!(created.state, ServiceState::Disabled);
        assert_eq!(registry.find_by_id(&created.id).unwrap(), Some(created));
    }

    #[test]
    fn update_merges_properties_and_requires_disabled() {
        let registry = InMemoryControllerServices::new();
        let created = registry.create(&spec(&[("a", "1"), ("b", "2")])).unwrap();
        registry.update_state_by_id(&created.id, ServiceState::Enabled).unwrap();

        let err = registry.update(&created.id, &spec(&[("b", "3")])).unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));

        registry.update_state_by_id(&created.id, ServiceState::Disabled).unwrap();
        let updated = registry.update(&created.id, &spec(&[("b", "3")])).unwrap();
        assert_eq!(updated.property("a"), Some("1"));
        assert_eq!(updated.property("b"), Some("3"));
    }

    #[test]
    fn missing_services_report_not_found() {
        let registry = InMemoryControllerServices::new();
        assert_eq!(registry.find_by_id("nope").unwrap(), None);
        assert_eq!(
            registry.update_state_by_id("nope", ServiceState::Enabled).unwrap_err(),
            RemoteError::NotFound("nope".to_string())
        );
        assert!(registry.disable_and_delete("nope").is_err());
    }
}
