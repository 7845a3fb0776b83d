pub mod datasource;
pub mod feed;
pub mod health;
pub mod search;
