//! Locally persisted datasource records.
//!
//! A JDBC record holds the encrypted password, a mirror of the connection properties
//! last written to the controller service, and the id of that service. The id is only a
//! reference: the remote service is owned by the controller and looked up on demand.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatasourceId(Uuid);

impl DatasourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DatasourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DatasourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DatasourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(DatasourceId)
            .map_err(|_| Error::not_found("datasource", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLink {
    pub feed_id: String,
    pub feed_name: String,
}

/// Connection properties of a JDBC datasource, as last sent to the controller service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionProperties {
    pub url: Option<String>,
    pub driver_class_name: Option<String>,
    pub driver_location: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JdbcDetails {
    pub type_name: Option<String>,
    pub controller_service_id: Option<String>,
    /// Ciphertext; never plaintext.
    pub password: Option<String>,
    pub connection: ConnectionProperties,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedDetails {
    pub datasource_type: Option<String>,
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatasourceKind {
    Jdbc(JdbcDetails),
    Derived(DerivedDetails),
}

/// Discriminant of `DatasourceKind`, used when a record is created by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTag {
    Jdbc,
    Derived,
}

impl KindTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            KindTag::Jdbc => "jdbc",
            KindTag::Derived => "derived",
        }
    }

    pub fn empty_kind(&self) -> DatasourceKind {
        match self {
            KindTag::Jdbc => DatasourceKind::Jdbc(JdbcDetails::default()),
            KindTag::Derived => DatasourceKind::Derived(DerivedDetails::default()),
        }
    }
}

impl FromStr for KindTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "jdbc" => Ok(KindTag::Jdbc),
            "derived" => Ok(KindTag::Derived),
            other => Err(Error::unsupported(format!("datasource kind '{}'", other))),
        }
    }
}

/// Relationship between a record and its remote connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState<'a> {
    Unlinked,
    /// Assumed valid until the controller says otherwise.
    Linked(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasourceRecord {
    pub id: DatasourceId,
    pub name: String,
    pub description: Option<String>,
    pub feed_sources: Vec<FeedLink>,
    pub feed_destinations: Vec<FeedLink>,
    pub kind: DatasourceKind,
}

impl DatasourceRecord {
    pub fn new(name: impl Into<String>, description: Option<String>, kind: KindTag) -> Self {
        Self {
            id: DatasourceId::new(),
            name: name.into(),
            description,
            feed_sources: Vec::new(),
            feed_destinations: Vec::new(),
            kind: kind.empty_kind(),
        }
    }

    pub fn kind_tag(&self) -> KindTag {
        match self.kind {
            DatasourceKind::Jdbc(_) => KindTag::Jdbc,
            DatasourceKind::Derived(_) => KindTag::Derived,
        }
    }

    pub fn controller_service_id(&self) -> Option<&str> {
        match &self.kind {
            DatasourceKind::Jdbc(details) => details.controller_service_id.as_deref(),
            DatasourceKind::Derived(_) => None,
        }
    }

    pub fn link_state(&self) -> LinkState<'_> {
        match self.controller_service_id() {
            Some(id) => LinkState::Linked(id),
            None => LinkState::Unlinked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ids_resolve_to_not_found() {
        let err = "not-a-uuid".parse::<DatasourceId>().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn link_state_follows_controller_service_id() {
        let mut record = DatasourceRecord::new("pg1", None, KindTag::Jdbc);
        assert_eq!(record.link_state(), LinkState::Unlinked);

        if let DatasourceKind::Jdbc(details) = &mut record.kind {
            details.controller_service_id = Some("cs-1".to_string());
        }
        assert_eq!(record.link_state(), LinkState::Linked("cs-1"));

        let derived = DatasourceRecord::new("hive.sales", None, KindTag::Derived);
        assert_eq!(derived.link_state(), LinkState::Unlinked);
    }
}
