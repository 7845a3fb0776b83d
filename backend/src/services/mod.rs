pub mod data_sources;
pub mod feeds;
pub mod query;
