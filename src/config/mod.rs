pub mod database;
pub mod environment;
pub mod oauth;

pub use database::{init_db, DbPool, StoreError};
pub use environment::{Config, ConfigError};
