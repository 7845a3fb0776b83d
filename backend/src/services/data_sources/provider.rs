//! Access to persisted datasource records.
//!
//! `DatasourceProvider` is the seam the transform works against; `SqliteDatasourceProvider`
//! implements it on the shared `Store`. Feed back-references are loaded with the record
//! and are read-only here: they are written by the ingestion path (`Store::link_feed`).

use super::domain::{
    ConnectionProperties, DatasourceId, DatasourceKind, DatasourceRecord, DerivedDetails, FeedLink, JdbcDetails,
    KindTag,
};
use crate::db::{FeedRole, Store};
use crate::error::{Error, Result};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

pub trait DatasourceProvider: Send + Sync {
    /// Parses `id` and checks that a record with that id exists.
    fn resolve(&self, id: &str) -> Result<DatasourceId>;

    fn get(&self, id: DatasourceId) -> Result<DatasourceRecord>;

    fn find_by_name(&self, name: &str) -> Result<Option<DatasourceRecord>>;

    /// Returns the record with this name, creating an empty one of `kind` if there is
    /// none. Fails with `Conflict` when the name belongs to a record of another kind.
    fn ensure(&self, name: &str, description: Option<&str>, kind: KindTag) -> Result<DatasourceRecord>;

    fn save(&self, record: &DatasourceRecord) -> Result<()>;

    fn find_all(&self) -> Result<Vec<DatasourceRecord>>;
}

pub struct SqliteDatasourceProvider {
    store: Arc<Store>,
}

const SELECT: &str = "SELECT id, name, description, kind, type_name, controller_service_id, password, \
                      connection_url, driver_class_name, driver_location, db_user, datasource_type, properties \
                      FROM datasources";

impl SqliteDatasourceProvider {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

/// Columns of a datasource row before feed links are attached.
fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, Option<String>, String, RawDetails)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        RawDetails {
            type_name: row.get(4)?,
            controller_service_id: row.get(5)?,
            password: row.get(6)?,
            url: row.get(7)?,
            driver_class_name: row.get(8)?,
            driver_location: row.get(9)?,
            user: row.get(10)?,
            datasource_type: row.get(11)?,
            properties: row.get(12)?,
        },
    ))
}

struct RawDetails {
    type_name: Option<String>,
    controller_service_id: Option<String>,
    password: Option<String>,
    url: Option<String>,
    driver_class_name: Option<String>,
    driver_location: Option<String>,
    user: Option<String>,
    datasource_type: Option<String>,
    properties: Option<String>,
}

fn assemble(conn: &Connection, raw: (String, String, Option<String>, String, RawDetails)) -> Result<DatasourceRecord> {
    let (id, name, description, kind, details) = raw;
    let kind = match kind.parse::<KindTag>()? {
        KindTag::Jdbc => DatasourceKind::Jdbc(JdbcDetails {
            type_name: details.type_name,
            controller_service_id: details.controller_service_id,
            password: details.password,
            connection: ConnectionProperties {
                url: details.url,
                driver_class_name: details.driver_class_name,
                driver_location: details.driver_location,
                user: details.user,
            },
        }),
        KindTag::Derived => DatasourceKind::Derived(DerivedDetails {
            datasource_type: details.datasource_type,
            properties: match details.properties {
                Some(json) => serde_json::from_str(&json)?,
                None => Default::default(),
            },
        }),
    };
    Ok(DatasourceRecord {
        id: id.parse()?,
        name,
        description,
        feed_sources: feed_links(conn, &id, FeedRole::Source)?,
        feed_destinations: feed_links(conn, &id, FeedRole::Destination)?,
        kind,
    })
}

fn feed_links(conn: &Connection, datasource_id: &str, role: FeedRole) -> Result<Vec<FeedLink>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.name FROM feed_datasources fd JOIN feeds f ON f.id = fd.feed_id
         WHERE fd.datasource_id = ?1 AND fd.role = ?2
         ORDER BY f.name",
    )?;
    let links = stmt
        .query_map(params![datasource_id, role.as_str()], |row| {
            Ok(FeedLink {
                feed_id: row.get(0)?,
                feed_name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(links)
}

fn find_by(conn: &Connection, clause: &str, key: &str) -> Result<Option<DatasourceRecord>> {
    let raw = conn
        .query_row(&format!("{} WHERE {} = ?1", SELECT, clause), params![key], record_from_row)
        .optional()?;
    raw.map(|raw| assemble(conn, raw)).transpose()
}

impl DatasourceProvider for SqliteDatasourceProvider {
    fn resolve(&self, id: &str) -> Result<DatasourceId> {
        let parsed: DatasourceId = id.parse()?;
        let exists = self.store.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM datasources WHERE id = ?1", params![parsed.to_string()], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })?;
        if exists {
            Ok(parsed)
        } else {
            Err(Error::not_found("datasource", id))
        }
    }

    fn get(&self, id: DatasourceId) -> Result<DatasourceRecord> {
        self.store
            .with_conn(|conn| find_by(conn, "id", &id.to_string()))?
            .ok_or_else(|| Error::not_found("datasource", id.to_string()))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<DatasourceRecord>> {
        self.store.with_conn(|conn| find_by(conn, "name", name))
    }

    fn ensure(&self, name: &str, description: Option<&str>, kind: KindTag) -> Result<DatasourceRecord> {
        self.store.with_conn(|conn| {
            if let Some(existing) = find_by(conn, "name", name)? {
                if existing.kind_tag() != kind {
                    return Err(Error::conflict(format!(
                        "datasource '{}' already exists as {}",
                        name,
                        existing.kind_tag().as_str()
                    )));
                }
                return Ok(existing);
            }
            let record = DatasourceRecord::new(name, description.map(str::to_string), kind);
            conn.execute(
                "INSERT INTO datasources (id, name, description, kind) VALUES (?1, ?2, ?3, ?4)",
                params![record.id.to_string(), record.name, record.description, kind.as_str()],
            )?;
            debug!("Created {} datasource {} ({})", kind.as_str(), record.name, record.id);
            Ok(record)
        })
    }

    fn save(&self, record: &DatasourceRecord) -> Result<()> {
        let (jdbc, derived) = match &record.kind {
            DatasourceKind::Jdbc(details) => (Some(details), None),
            DatasourceKind::Derived(details) => (None, Some(details)),
        };
        let properties = derived.map(|d| serde_json::to_string(&d.properties)).transpose()?;
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO datasources
                    (id, name, description, kind, type_name, controller_service_id, password,
                     connection_url, driver_class_name, driver_location, db_user, datasource_type, properties)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    kind = excluded.kind,
                    type_name = excluded.type_name,
                    controller_service_id = excluded.controller_service_id,
                    password = excluded.password,
                    connection_url = excluded.connection_url,
                    driver_class_name = excluded.driver_class_name,
                    driver_location = excluded.driver_location,
                    db_user = excluded.db_user,
                    datasource_type = excluded.datasource_type,
                    properties = excluded.properties",
                params![
                    record.id.to_string(),
                    record.name,
                    record.description,
                    record.kind_tag().as_str(),
                    jdbc.and_then(|d| d.type_name.clone()),
                    jdbc.and_then(|d| d.controller_service_id.clone()),
                    jdbc.and_then(|d| d.password.clone()),
                    jdbc.and_then(|d| d.connection.url.clone()),
                    jdbc.and_then(|d| d.connection.driver_class_name.clone()),
                    jdbc.and_then(|d| d.connection.driver_location.clone()),
                    jdbc.and_then(|d| d.connection.user.clone()),
                    derived.and_then(|d| d.datasource_type.clone()),
                    properties,
                ],
            )?;
            Ok(())
        })
    }

    fn find_all(&self) -> Result<Vec<DatasourceRecord>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY name", SELECT))?;
            let raws = stmt
                .query_map([], record_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raws.into_iter().map(|raw| assemble(conn, raw)).collect()
        })
    }
}
