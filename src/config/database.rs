use sqlx::{mysql::MySqlPoolOptions, MySql, Pool};
use std::time::Duration;

use super::environment::Config;

pub type DbPool = Pool<MySql>;

/// Typed failures surfaced by every repository implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    /// Unique-index violation; carries the offending key name when the driver reports one.
    #[error("Conflict on {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                // MySQL: "Duplicate entry 'x' for key 'users.uq_users_email'"
                let key = db
                    .message()
                    .rsplit("for key ")
                    .next()
                    .unwrap_or_default()
                    .trim_matches(|c| c == '\'' || c == '`')
                    .to_string();
                StoreError::Conflict(key)
            }
            _ => StoreError::Database(err),
        }
    }
}

impl StoreError {
    pub fn is_conflict_on(&self, key_fragment: &str) -> bool {
        matches!(self, StoreError::Conflict(key) if key.contains(key_fragment))
    }
}

pub async fn init_db(config: &Config) -> Result<DbPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .min_connections(config.db_min_connections)
        .max_connections(config.db_max_connections)
        .max_lifetime(Duration::from_secs(60 * 60))
        .idle_timeout(Duration::from_secs(30 * 60))
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
}
