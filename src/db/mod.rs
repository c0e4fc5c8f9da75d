//! Postgres pool for the lending engine
//!
//! The pool backs `PgStore`: each repayment, sweep step or unblock holds one
//! connection for its transaction. The acquire timeout comes from config so
//! a saturated pool fails fast as a concurrency conflict. Migrations create
//! the users, loans, repayments, reputations and reputation_events tables.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Startup and health failures, kept apart from `EngineError`
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

/// Connect with the configured pool size and acquire timeout
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(database = %config.database_url_masked(), "Connecting to reputation store");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database pool ready"
    );

    Ok(pool)
}

/// Apply `./migrations` (schema and the Postgres enums for loan, user and
/// reputation event types)
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Applying reputation engine migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Migrations applied");

    Ok(())
}

/// Round-trip used by `PgStore::ping` for `/health`
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    Ok(())
}
