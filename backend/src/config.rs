//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid configuration. Two
//! entry points are provided:
//! - `Config::load(path)` reads a JSON file.
//! - `Config::from_env()` starts from the defaults and applies `FEEDMGR_DATABASE`,
//!   `FEEDMGR_CONTROLLER_SERVICE_TYPE` and `FEEDMGR_LOG`.

use crate::controller::DBCP_CONNECTION_POOL;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Database value that selects a private in-memory store.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding datasources and execution history, or `:memory:`.
    pub database: String,
    /// Controller-service type requested when a connection pool is created.
    pub controller_service_type: String,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `env_logger` filter, used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "feedmgr.sqlite".to_string(),
            controller_service_type: DBCP_CONNECTION_POOL.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn in_memory() -> Self {
        Self {
            database: IN_MEMORY.to_string(),
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(database) = lookup("FEEDMGR_DATABASE") {
            self.database = database;
        }
        if let Some(service_type) = lookup("FEEDMGR_CONTROLLER_SERVICE_TYPE") {
            self.controller_service_type = service_type;
        }
        if let Some(filter) = lookup("FEEDMGR_LOG") {
            self.logging.filter = filter;
        }
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_object_yields_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.controller_service_type, DBCP_CONNECTION_POOL);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = Config::from_json(r#"{"database":":memory:","logging":{"filter":"debug"}}"#).unwrap();
        assert!(config.is_in_memory());
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.controller_service_type, DBCP_CONNECTION_POOL);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{ nope").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn overrides_replace_only_present_keys() {
        let vars: HashMap<&str, &str> = [("FEEDMGR_DATABASE", "/tmp/other.sqlite")].into();
        let config = Config::default().with_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.database, "/tmp/other.sqlite");
        assert_eq!(config.logging.filter, "info");
    }
}
