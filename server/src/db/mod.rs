// server/src/db/mod.rs

pub mod pg_store;
pub mod seed;

pub use pg_store::PgStore;

use crate::errors::Result as AppResult;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub async fn connect(database_url: &str) -> AppResult<PgPool> {
  let pool = PgPoolOptions::new()
    .max_connections(10)
    .acquire_timeout(Duration::from_secs(5))
    .connect(database_url)
    .await?;
  tracing::info!("Successfully connected to the database.");
  Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> AppResult<()> {
  sqlx::migrate!("./migrations")
    .run(pool)
    .await
    .map_err(|e| crate::errors::AppError::Internal(format!("Migration failed: {}", e)))?;
  tracing::info!("Database migrations applied.");
  Ok(())
}
