//! # Datasource Model Transform
//!
//! Converts between the locally persisted `DatasourceRecord` and the external
//! `Datasource` view.
//!
//! ## Reading (`to_datasource`)
//!
//! The view is built fresh at the requested `Level`:
//! 1. Id, name and description are always set; so are the JDBC `type` label and the
//!    linked `controllerServiceId`.
//! 2. `Connections` and above add the source/destination feed references.
//! 3. `Full` and above look the linked service up and copy its live connection
//!    properties. A missing service or a failed lookup leaves them unset.
//! 4. `Admin` adds the decrypted password. A decryption failure only drops that field and
//!    is reported in `Projection::field_errors`.
//!
//! ## Writing (`to_domain`)
//!
//! Only JDBC views can be written. The record is resolved by id, or created by name when
//! the view has none, in which case the new id is written back onto the view. Blank
//! fields on the view are ignored. When the write changes the name, the description or
//! any connection property, or the record is not linked yet, the controller service is
//! synchronized (see `sync`) before the record is saved. A failed synchronization leaves
//! the record as it was. Local checks (name clash, password encryption) run before any
//! remote call; if the save still fails, a service created by this write is removed.

use super::domain::{ConnectionProperties, DatasourceKind, DatasourceRecord, FeedLink, JdbcDetails, KindTag};
use super::provider::DatasourceProvider;
use super::sync::{ControllerServiceSync, SyncRequest};
use crate::cipher::TextCipher;
use crate::controller::{
    spawn_disable_and_delete, ControllerServices, DATABASE_CONNECTION_URL, DATABASE_DRIVER_CLASS_NAME, DATABASE_DRIVER_LOCATION,
    DATABASE_USER, PASSWORD,
};
use crate::error::{Error, Result};
use common::model::datasource::{
    Datasource, DatasourceHeader, DerivedDatasource, FeedRef, JdbcDatasource, Level,
};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A field left out of a projection, and why.
#[derive(Debug)]
pub struct FieldError {
    pub field: &'static str,
    pub error: Error,
}

#[derive(Debug)]
pub struct Projection {
    pub datasource: Datasource,
    pub field_errors: Vec<FieldError>,
}

impl Projection {
    pub fn is_complete(&self) -> bool {
        self.field_errors.is_empty()
    }
}

pub struct DatasourceModelTransform {
    provider: Arc<dyn DatasourceProvider>,
    cipher: Arc<dyn TextCipher>,
    controller: Arc<dyn ControllerServices>,
    sync: ControllerServiceSync,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn feed_refs(links: &[FeedLink]) -> Vec<FeedRef> {
    links
        .iter()
        .map(|link| FeedRef {
            id: link.feed_id.clone(),
            system_name: link.feed_name.clone(),
        })
        .collect()
}

/// Connection properties set on the view, keyed by controller-service property name.
fn connection_properties(view: &JdbcDatasource) -> BTreeMap<String, String> {
    [
        (DATABASE_CONNECTION_URL, non_blank(&view.database_connection_url)),
        (DATABASE_DRIVER_CLASS_NAME, non_blank(&view.database_driver_class_name)),
        (DATABASE_DRIVER_LOCATION, non_blank(&view.database_driver_location)),
        (DATABASE_USER, non_blank(&view.database_user)),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| (key.to_string(), v.to_string())))
    .collect()
}

/// The local mirror in the same shape as `connection_properties`.
fn mirrored_properties(mirror: &ConnectionProperties) -> BTreeMap<String, String> {
    [
        (DATABASE_CONNECTION_URL, &mirror.url),
        (DATABASE_DRIVER_CLASS_NAME, &mirror.driver_class_name),
        (DATABASE_DRIVER_LOCATION, &mirror.driver_location),
        (DATABASE_USER, &mirror.user),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.clone().map(|v| (key.to_string(), v)))
    .collect()
}

fn merge_into_mirror(mirror: &mut ConnectionProperties, view: &JdbcDatasource) {
    let fields = [
        (&mut mirror.url, non_blank(&view.database_connection_url)),
        (&mut mirror.driver_class_name, non_blank(&view.database_driver_class_name)),
        (&mut mirror.driver_location, non_blank(&view.database_driver_location)),
        (&mut mirror.user, non_blank(&view.database_user)),
    ];
    for (slot, value) in fields {
        if let Some(value) = value {
            *slot = Some(value.to_string());
        }
    }
}

impl DatasourceModelTransform {
    pub fn new(
        provider: Arc<dyn DatasourceProvider>,
        cipher: Arc<dyn TextCipher>,
        controller: Arc<dyn ControllerServices>,
        service_type: impl Into<String>,
    ) -> Self {
        let sync = ControllerServiceSync::new(Arc::clone(&controller), service_type);
        Self {
            provider,
            cipher,
            controller,
            sync,
        }
    }

    pub fn provider(&self) -> &Arc<dyn DatasourceProvider> {
        &self.provider
    }

    /// Builds the external view of `record` at `level`.
    pub fn to_datasource(&self, record: &DatasourceRecord, level: Level) -> Projection {
        let mut header = DatasourceHeader {
            id: Some(record.id.to_string()),
            name: record.name.clone(),
            description: record.description.clone(),
            ..Default::default()
        };
        if level.at_least(Level::Connections) {
            header.source_for_feeds = feed_refs(&record.feed_sources);
            header.destination_for_feeds = feed_refs(&record.feed_destinations);
        }

        let mut field_errors = Vec::new();
        let datasource = match &record.kind {
            DatasourceKind::Derived(details) => Datasource::Derived(DerivedDatasource {
                header,
                datasource_type: details.datasource_type.clone(),
                properties: details.properties.clone(),
            }),
            DatasourceKind::Jdbc(details) => {
                let mut view = JdbcDatasource {
                    header,
                    type_name: details.type_name.clone(),
                    controller_service_id: details.controller_service_id.clone(),
                    ..Default::default()
                };
                if level.at_least(Level::Admin) {
                    if let Some(ciphertext) = &details.password {
                        match self.cipher.decrypt(ciphertext) {
                            Ok(plaintext) => view.password = Some(plaintext),
                            Err(e) => {
                                warn!("Omitting password of datasource {}: {}", record.name, e);
                                field_errors.push(FieldError {
                                    field: "password",
                                    error: e.into(),
                                });
                            }
                        }
                    }
                }
                if level.at_least(Level::Full) {
                    self.overlay_live_properties(&mut view, details);
                }
                Datasource::Jdbc(view)
            }
        };

        Projection {
            datasource,
            field_errors,
        }
    }

    fn overlay_live_properties(&self, view: &mut JdbcDatasource, details: &JdbcDetails) {
        let Some(service_id) = details.controller_service_id.as_deref() else {
            return;
        };
        match self.controller.find_by_id(service_id) {
            Ok(Some(service)) => {
                let live = |key: &str| service.property(key).map(str::to_string);
                view.database_connection_url = live(DATABASE_CONNECTION_URL);
                view.database_driver_class_name = live(DATABASE_DRIVER_CLASS_NAME);
                view.database_driver_location = live(DATABASE_DRIVER_LOCATION);
                view.database_user = live(DATABASE_USER);
            }
            Ok(None) => debug!("Controller service {} not found; live properties left unset", service_id),
            Err(e) => debug!("Lookup of controller service {} failed: {}", service_id, e),
        }
    }

    /// Applies `view` to its datasource record, synchronizing the controller service when
    /// needed, and returns the saved record.
    ///
    /// # Arguments
    ///
    /// * `view` - the incoming view. Its `id` is filled in when a record is created, and
    ///   its `controllerServiceId` is set to the link the record ends up with.
    ///
    /// # Returns
    ///
    /// The saved record, or:
    /// - `Error::Unsupported` for a derived view or a record of another kind,
    /// - `Error::Conflict` when renaming to a name another datasource already has,
    /// - `Error::Cipher` when the password cannot be encrypted (nothing is changed),
    /// - `Error::Sync` when the controller service could not be brought in line.
    pub fn to_domain(&self, view: &mut Datasource) -> Result<DatasourceRecord> {
        let view = match view {
            Datasource::Jdbc(view) => view,
            Datasource::Derived(derived) => {
                return Err(Error::unsupported(format!(
                    "derived datasource '{}' is read-only",
                    derived.header.name
                )))
            }
        };

        let password = non_blank(&view.password).map(str::to_string);
        let encrypted = password
            .as_deref()
            .map(|plaintext| self.cipher.encrypt(plaintext))
            .transpose()?;

        let mut record = match view.header.id.as_deref() {
            Some(id) => {
                let id = self.provider.resolve(id)?;
                self.provider.get(id)?
            }
            None => {
                let record =
                    self.provider
                        .ensure(&view.header.name, view.header.description.as_deref(), KindTag::Jdbc)?;
                view.header.id = Some(record.id.to_string());
                record
            }
        };

        let details = match &record.kind {
            DatasourceKind::Jdbc(details) => details.clone(),
            DatasourceKind::Derived(_) => {
                return Err(Error::unsupported(format!(
                    "datasource '{}' is derived and cannot take JDBC properties",
                    record.name
                )))
            }
        };
        if record.name != view.header.name {
            if let Some(other) = self.provider.find_by_name(&view.header.name)? {
                if other.id != record.id {
                    return Err(Error::conflict(format!(
                        "cannot rename datasource '{}': '{}' is already taken",
                        record.name, view.header.name
                    )));
                }
            }
        }
        view.controller_service_id = details.controller_service_id.clone();

        let mut properties = connection_properties(view);
        let mirrored = mirrored_properties(&details.connection);
        let connection_changed = properties.iter().any(|(key, value)| mirrored.get(key) != Some(value));
        let password_changed = match (&password, &details.password) {
            (Some(plaintext), Some(stored)) => self.cipher.decrypt(stored).map_or(true, |p| &p != plaintext),
            (Some(_), None) => true,
            (None, _) => false,
        };
        let renamed = record.name != view.header.name || record.description != view.header.description;
        if let Some(plaintext) = &password {
            properties.insert(PASSWORD.to_string(), plaintext.clone());
        }

        let linked = details.controller_service_id.as_deref();
        if linked.is_none() || connection_changed || password_changed || renamed {
            let request = SyncRequest {
                datasource_id: record.id,
                linked_service_id: linked,
                name: &view.header.name,
                comments: view.header.description.as_deref(),
                properties: &properties,
            };
            let create_properties = || -> Result<BTreeMap<String, String>> {
                let mut full = mirrored.clone();
                if password.is_none() {
                    if let Some(stored) = &details.password {
                        full.insert(PASSWORD.to_string(), self.cipher.decrypt(stored)?);
                    }
                }
                full.extend(properties.clone());
                Ok(full)
            };
            let service_id = self.sync.sync(&request, create_properties)?;
            view.controller_service_id = Some(service_id);
        } else {
            debug!("Datasource {} unchanged; controller service not touched", record.name);
        }

        record.name = view.header.name.clone();
        record.description = view.header.description.clone();
        if let DatasourceKind::Jdbc(target) = &mut record.kind {
            target.type_name = view.type_name.clone();
            target.controller_service_id = view.controller_service_id.clone();
            merge_into_mirror(&mut target.connection, view);
            if encrypted.is_some() {
                target.password = encrypted;
            }
        }
        if let Err(e) = self.provider.save(&record) {
            // A service created by this write has no record pointing at it.
            let created = view
                .controller_service_id
                .take()
                .filter(|id| Some(id) != details.controller_service_id.as_ref());
            if let Some(created) = created {
                warn!(
                    "Saving datasource {} failed; removing new controller service {}",
                    record.name, created
                );
                spawn_disable_and_delete(Arc::clone(&self.controller), created);
            }
            view.controller_service_id = details.controller_service_id;
            return Err(e);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherError;
    use crate::controller::state::InMemoryControllerServices;
    use crate::db::Store;
    use crate::services::data_sources::domain::DatasourceId;
    use crate::services::data_sources::provider::SqliteDatasourceProvider;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn blank_fields_are_not_set() {
        let view = JdbcDatasource {
            database_connection_url: Some("jdbc:postgresql://h/db".to_string()),
            database_user: Some("   ".to_string()),
            database_driver_class_name: Some(String::new()),
            ..Default::default()
        };

        let properties = connection_properties(&view);
        assert_eq!(properties.len(), 1);
        assert_eq!(properties.get(DATABASE_CONNECTION_URL).map(String::as_str), Some("jdbc:postgresql://h/db"));
    }

    #[test]
    fn mirror_merges_only_set_fields() {
        let mut mirror = ConnectionProperties {
            url: Some("jdbc:old".to_string()),
            user: Some("u".to_string()),
            ..Default::default()
        };
        let view = JdbcDatasource {
            database_user: Some("v".to_string()),
            database_connection_url: Some(" ".to_string()),
            ..Default::default()
        };

        merge_into_mirror(&mut mirror, &view);
        assert_eq!(mirror.url.as_deref(), Some("jdbc:old"));
        assert_eq!(mirror.user.as_deref(), Some("v"));
        assert_eq!(mirrored_properties(&mirror).len(), 2);
    }

    struct Reversed;

    impl TextCipher for Reversed {
        fn encrypt(&self, plaintext: &str) -> std::result::Result<String, CipherError> {
            Ok(plaintext.chars().rev().collect())
        }

        fn decrypt(&self, ciphertext: &str) -> std::result::Result<String, CipherError> {
            Ok(ciphertext.chars().rev().collect())
        }
    }

    /// Stores records normally but refuses every save.
    struct ReadOnlyProvider(SqliteDatasourceProvider);

    impl DatasourceProvider for ReadOnlyProvider {
        fn resolve(&self, id: &str) -> Result<DatasourceId> {
            self.0.resolve(id)
        }

        fn get(&self, id: DatasourceId) -> Result<DatasourceRecord> {
            self.0.get(id)
        }

        fn find_by_name(&self, name: &str) -> Result<Option<DatasourceRecord>> {
            self.0.find_by_name(name)
        }

        fn ensure(&self, name: &str, description: Option<&str>, kind: KindTag) -> Result<DatasourceRecord> {
            self.0.ensure(name, description, kind)
        }

        fn save(&self, _record: &DatasourceRecord) -> Result<()> {
            Err(Error::StoreUnavailable("disk full".to_string()))
        }

        fn find_all(&self) -> Result<Vec<DatasourceRecord>> {
            self.0.find_all()
        }
    }

    #[test]
    fn failed_save_removes_the_service_it_created() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let registry = InMemoryControllerServices::new();
        let transform = DatasourceModelTransform::new(
            Arc::new(ReadOnlyProvider(SqliteDatasourceProvider::new(store))),
            Arc::new(Reversed),
            Arc::new(registry.clone()),
            "pool",
        );
        let mut view = Datasource::Jdbc(JdbcDatasource {
            header: DatasourceHeader {
                name: "pg1".to_string(),
                ..Default::default()
            },
            database_user: Some("u".to_string()),
            ..Default::default()
        });

        let err = transform.to_domain(&mut view).unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        match &view {
            Datasource::Jdbc(view) => assert_eq!(view.controller_service_id, None),
            Datasource::Derived(_) => panic!("expected a JDBC view"),
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while !registry.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(registry.is_empty());
    }
}
