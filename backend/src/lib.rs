//! # Feed Manager Core
//!
//! Library core of the feed manager: queries over executed feeds and jobs, and
//! management of datasources together with the remote connection pools that back them.
//!
//! ## Components
//!
//! - `db`: the SQLite metadata store and the execution ingestion path.
//! - `services::query`: filter/order/window query builder over whitelisted columns.
//! - `services::feeds`: `FeedRepository`, searches and health aggregates.
//! - `services::data_sources`: leveled projection of datasources and synchronization of
//!   their controller services.
//! - `controller` / `cipher`: the seams to the remote controller API and to the secret
//!   cipher. Both are injected.
//!
//! `FeedManager` wires them together from a `Config`.

pub mod cipher;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod logging;
pub mod services;

use crate::cipher::TextCipher;
use crate::config::Config;
use crate::controller::ControllerServices;
use crate::db::Store;
use crate::error::Result;
use crate::services::data_sources::{
    DatasourceModelTransform, DatasourceProvider, DatasourceRecord, Projection, SqliteDatasourceProvider,
};
use crate::services::feeds::FeedRepository;
use common::model::datasource::{Datasource, Level};
use log::info;
use std::sync::Arc;

pub struct FeedManager {
    store: Arc<Store>,
    feeds: FeedRepository,
    datasources: DatasourceModelTransform,
}

impl FeedManager {
    /// Opens the store named by `config` and builds the services on top of it.
    pub fn new(
        config: &Config,
        controller: Arc<dyn ControllerServices>,
        cipher: Arc<dyn TextCipher>,
    ) -> Result<Self> {
        let store = Arc::new(Store::open(config)?);
        info!("Feed manager using store {}", config.database);
        Ok(Self::with_store(store, config, controller, cipher))
    }

    pub fn with_store(
        store: Arc<Store>,
        config: &Config,
        controller: Arc<dyn ControllerServices>,
        cipher: Arc<dyn TextCipher>,
    ) -> Self {
        let provider: Arc<dyn DatasourceProvider> = Arc::new(SqliteDatasourceProvider::new(Arc::clone(&store)));
        Self {
            feeds: FeedRepository::new(Arc::clone(&store)),
            datasources: DatasourceModelTransform::new(
                provider,
                cipher,
                controller,
                config.controller_service_type.clone(),
            ),
            store,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn feeds(&self) -> &FeedRepository {
        &self.feeds
    }

    pub fn datasources(&self) -> &DatasourceModelTransform {
        &self.datasources
    }

    /// Projection of the datasource with this id.
    pub fn get_datasource(&self, id: &str, level: Level) -> Result<Projection> {
        let provider = self.datasources.provider();
        let record = provider.get(provider.resolve(id)?)?;
        Ok(self.datasources.to_datasource(&record, level))
    }

    /// Writes `datasource` and returns the view as the caller should see it afterwards:
    /// with its assigned id and current controller-service link.
    pub fn save_datasource(&self, mut datasource: Datasource) -> Result<(Datasource, DatasourceRecord)> {
        let record = self.datasources.to_domain(&mut datasource)?;
        Ok((datasource, record))
    }

    pub fn list_datasources(&self, level: Level) -> Result<Vec<Projection>> {
        let records = self.datasources.provider().find_all()?;
        Ok(records
            .iter()
            .map(|record| self.datasources.to_datasource(record, level))
            .collect())
    }
}
