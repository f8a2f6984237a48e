pub mod api;
pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod monitoring;
pub mod store;
pub mod test_utils;
pub mod tracing_client;
