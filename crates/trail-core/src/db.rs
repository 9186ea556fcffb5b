//! Connection pool setup

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::AuditResult;

/// Connect a Postgres pool using the given configuration
pub async fn create_pool(config: &DatabaseConfig) -> AuditResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Build a pool that only connects on first use
///
/// Lets callers wire up readers before the database is reachable.
pub fn create_lazy_pool(config: &DatabaseConfig) -> AuditResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_lazy(&config.url)?;

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> AuditResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
