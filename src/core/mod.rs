// src/core/mod.rs
//! Infrastructure shared by every domain: configuration, storage, caching and HTTP

pub mod cache;
pub mod config_manager;
pub mod database;
pub mod service_client;

pub use cache::{CacheStats, TtlCache};
pub use config_manager::ConfigManager;
pub use database::Database;
pub use service_client::ServiceClient;
