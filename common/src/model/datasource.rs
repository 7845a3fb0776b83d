//! External views of a datasource.
//!
//! These are transient projections built fresh for every request by the feed manager's
//! datasource transform. Which fields are populated depends on the `Level` the caller
//! asked for; unpopulated fields are `None`/empty and skipped when serialized.
//!
//! A view is one of two kinds:
//! - `JdbcDatasource`: a user-managed connection with credentials and a linked remote
//!   connection pool (`controller_service_id`).
//! - `DerivedDatasource`: a datasource inferred from feed metadata, described by a type
//!   label and a free-form property map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Disclosure level of a projected view, from most to least revealing.
///
/// The variants are declared in order, so the derived `Ord` gives
/// `Admin < Full < Connections < Basic`: a smaller level discloses more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    /// Everything, including decrypted secrets.
    Admin,
    /// Everything except secrets, including live connection properties.
    Full,
    /// Basic fields plus source/destination feed references.
    Connections,
    /// Identity fields only.
    Basic,
}

impl Level {
    /// Returns true when `self` is at least as permissive as `threshold`, i.e. a view
    /// requested at `self` may carry the fields gated behind `threshold`.
    pub fn at_least(self, threshold: Level) -> bool {
        self <= threshold
    }
}

/// Back-reference to a feed that reads from or writes to a datasource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRef {
    pub id: String,
    pub system_name: String,
}

/// Fields shared by every datasource kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceHeader {
    /// Assigned by the store; absent on a create request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_for_feeds: Vec<FeedRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_for_feeds: Vec<FeedRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdbcDatasource {
    #[serde(flatten)]
    pub header: DatasourceHeader,
    /// Free-text label such as `PostgreSQL`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_connection_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_driver_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_driver_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_user: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedDatasource {
    #[serde(flatten)]
    pub header: DatasourceHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource_type: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum Datasource {
    #[serde(rename = "JdbcDatasource")]
    Jdbc(JdbcDatasource),
    #[serde(rename = "DerivedDatasource")]
    Derived(DerivedDatasource),
}

impl Datasource {
    pub fn header(&self) -> &DatasourceHeader {
        match self {
            Datasource::Jdbc(ds) => &ds.header,
            Datasource::Derived(ds) => &ds.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut DatasourceHeader {
        match self {
            Datasource::Jdbc(ds) => &mut ds.header,
            Datasource::Derived(ds) => &mut ds.header,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.header().id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }
}
