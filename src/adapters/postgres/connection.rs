//! Postgres connection pool management.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("Failed to create pool: {0}")]
    PoolCreationFailed(#[source] sqlx::Error),
    #[error("Failed to run migrations: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

/// Create the process-wide pool. The cap tracks the transaction-pooling
/// proxy's per-service connection limit; everything runs in UTC.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, ConnectionError> {
    let connect_options = PgConnectOptions::from_str(&config.url)
        .map_err(|_| ConnectionError::InvalidDatabaseUrl(config.url.clone()))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(connect_options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)?;

    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), ConnectionError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(ConnectionError::MigrationFailed)
}
