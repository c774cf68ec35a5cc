//! Connection pools for the foreign and native databases.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::Config;
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Source and target pools opened from configuration.
#[derive(Clone)]
pub struct Pools {
    /// Foreign database; also holds the mapping tables.
    pub source: SqlitePool,
    /// Native database; also holds persisted job state.
    pub target: SqlitePool,
}

impl Pools {
    /// Open both pools.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let source = connect_sqlite(
            &config.source.url,
            config.source.max_connections,
            false,
            "opening source database",
        )
        .await?;
        let target = connect_sqlite(
            &config.target.url,
            config.target.max_connections,
            true,
            "opening target database",
        )
        .await?;
        Ok(Self { source, target })
    }
}

/// Open a SQLite pool and verify it answers a trivial query.
///
/// The foreign database must already exist; the native one is created when
/// `create_if_missing` is set.
pub async fn connect_sqlite(
    url: &str,
    max_connections: u32,
    create_if_missing: bool,
    context: &str,
) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| MigrateError::pool(e, context))?
        .create_if_missing(create_if_missing);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(POOL_CONNECTION_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| MigrateError::pool(e, context))?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| MigrateError::pool(e, context))?;

    info!("Connected: {}", context);
    Ok(pool)
}

/// Whether a table exists, by unquoted name.
pub async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Single-connection in-memory pool. Every connection to `sqlite::memory:`
/// is a separate database, so the pool never opens a second one or recycles
/// the first.
pub async fn memory_pool() -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| MigrateError::pool(e, "opening in-memory database"))
}
