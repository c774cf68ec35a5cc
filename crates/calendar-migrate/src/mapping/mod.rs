//! SQLite-backed mapping store.
//!
//! One table per record type, created beside the foreign tables so the
//! reader's anti-join is a single query. `foreign_id` is the primary key of
//! each table: a foreign item is recorded exactly once, whichever outcome
//! comes first.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, info};

use crate::core::identifier::MappingTables;
use crate::core::{MappingOutcome, MappingStore, MigrationRecord, RecordType};
use crate::error::Result;

/// Mapping store living in the foreign database.
pub struct SqliteMappingStore {
    pool: SqlitePool,
    tables: MappingTables,
}

impl SqliteMappingStore {
    /// Create a mapping store using tables named `{prefix}events`, etc.
    pub fn new(pool: SqlitePool, prefix: &str) -> Result<Self> {
        Ok(Self {
            pool,
            tables: MappingTables::new(prefix)?,
        })
    }
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn init_schema(&self) -> Result<()> {
        for record_type in RecordType::ALL {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    foreign_id INTEGER NOT NULL PRIMARY KEY,
                    native_id INTEGER,
                    migrated INTEGER NOT NULL DEFAULT 0,
                    recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )",
                self.tables.table(record_type)
            );
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn record(
        &self,
        record_type: RecordType,
        foreign_id: i64,
        outcome: MappingOutcome,
    ) -> Result<()> {
        let (native_id, migrated) = match outcome {
            MappingOutcome::Migrated(id) => (Some(id), true),
            MappingOutcome::Skipped => (None, false),
        };

        let sql = format!(
            "INSERT OR IGNORE INTO {} (foreign_id, native_id, migrated) VALUES (?, ?, ?)",
            self.tables.table(record_type)
        );
        let result = sqlx::query(&sql)
            .bind(foreign_id)
            .bind(native_id)
            .bind(migrated)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!(
                "Mapping for {} {} already recorded, keeping first outcome",
                record_type.label(),
                foreign_id
            );
        }
        Ok(())
    }

    async fn lookup(
        &self,
        record_type: RecordType,
        foreign_id: i64,
    ) -> Result<Option<MigrationRecord>> {
        let sql = format!(
            "SELECT foreign_id, native_id, migrated FROM {} WHERE foreign_id = ?",
            self.tables.table(record_type)
        );
        let row = sqlx::query(&sql)
            .bind(foreign_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(MigrationRecord {
                foreign_id: row.try_get("foreign_id")?,
                native_id: row.try_get("native_id")?,
                migrated: row.try_get::<i64, _>("migrated")? != 0,
            })),
            None => Ok(None),
        }
    }

    async fn count(&self, record_type: RecordType) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.tables.table(record_type));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn drop_all(&self) -> Result<()> {
        for record_type in RecordType::ALL {
            let sql = format!("DROP TABLE IF EXISTS {}", self.tables.table(record_type));
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        info!("Dropped mapping tables");
        Ok(())
    }
}
