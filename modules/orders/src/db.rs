use outbox::{OutboxResult, PgStore};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Initialize a connection pool to the PostgreSQL database
///
/// # Connection Limits
/// - Production default: 10 connections
/// - Tests cap the pool through `DB_MAX_CONNECTIONS` (recommended: 1-2)
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(10);

    let min_connections = std::env::var("DB_MIN_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);

    // Tests may need a longer timeout than the 3s fail-fast production default
    let acquire_timeout_secs = std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(3);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Apply the outbox and orders migrations to one database
pub async fn run_migrations(pool: &PgPool) -> OutboxResult<()> {
    PgStore::new(pool.clone()).run_migrations().await?;

    let mut migrator = sqlx::migrate!("./db/migrations");
    migrator.set_ignore_missing(true);
    migrator.run(pool).await?;

    Ok(())
}
