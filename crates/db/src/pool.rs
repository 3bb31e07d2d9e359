//! Postgres connection pool.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::StoreError;

/// Type alias for the shared Postgres pool used across the whole application.
pub type DbPool = PgPool;

/// Connection settings, passed in by whoever constructs the store.
///
/// There is deliberately no global loader: the binary reads its
/// environment/flags, builds one of these, and injects it.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
        }
    }
}

/// Create a new connection pool from the given config.
///
/// Establishing the first connection doubles as the startup connectivity
/// check: a bad URL or unreachable server fails here, before any
/// operation runs.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, StoreError> {
    info!(
        "Connecting to database (max_connections={})",
        config.max_connections
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}

/// Run embedded SQLx migrations located in `./migrations` (relative to the
/// workspace root at build time).
pub async fn run_migrations(pool: &DbPool) -> Result<(), StoreError> {
    info!("Running database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
