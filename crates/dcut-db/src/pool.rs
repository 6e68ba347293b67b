//! Connection pool setup and migrations.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::{DbError, DbResult};

/// Connect to Postgres with sane pool defaults for a request-driven API.
pub async fn connect(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Connect using `DATABASE_URL`.
pub async fn connect_from_env() -> DbResult<PgPool> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| DbError::Config("DATABASE_URL not set".to_string()))?;
    connect(&url).await
}

/// Apply embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
