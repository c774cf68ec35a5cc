//! Database-backed job state.
//!
//! Stores the job status and the pending error log in two tables of the
//! native database. Error logs carry an expiry; a log read after its expiry
//! is treated as empty. Loads before `init_schema` behave as for a job that
//! never ran.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::orchestrator::pools::table_exists;
use crate::report::ErrorEntry;
use crate::state::backend::{status_to_str, str_to_status, StateBackend};
use crate::state::MigrationStatus;

/// SQLite state backend.
pub struct DbStateBackend {
    pool: SqlitePool,
}

impl DbStateBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateBackend for DbStateBackend {
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _calmig_job_status (
                job_id TEXT PRIMARY KEY,
                status TEXT NOT NULL CHECK (status IN ('not_started', 'in_progress', 'complete')),
                completed_at TEXT,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _calmig_job_errors (
                job_id TEXT PRIMARY KEY,
                entries TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_status(&self, job_id: &str) -> Result<MigrationStatus> {
        if !table_exists(&self.pool, "_calmig_job_status").await? {
            return Ok(MigrationStatus::NotStarted);
        }
        let row = sqlx::query("SELECT status, completed_at FROM _calmig_job_status WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(MigrationStatus::NotStarted);
        };
        let status: String = row.try_get("status")?;
        let completed_at: Option<String> = row.try_get("completed_at")?;
        let completed_at = completed_at
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| MigrateError::State(format!("Invalid completion date {}: {}", s, e)))
            })
            .transpose()?;
        str_to_status(&status, completed_at)
    }

    async fn save_status(&self, job_id: &str, status: &MigrationStatus) -> Result<()> {
        sqlx::query(
            "INSERT INTO _calmig_job_status (job_id, status, completed_at, updated_at)
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT (job_id) DO UPDATE SET
                status = excluded.status,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at",
        )
        .bind(job_id)
        .bind(status_to_str(status))
        .bind(status.completed_at().map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_errors(&self, job_id: &str) -> Result<Vec<ErrorEntry>> {
        if !table_exists(&self.pool, "_calmig_job_errors").await? {
            return Ok(Vec::new());
        }
        let entries: Option<String> = sqlx::query_scalar(
            "SELECT entries FROM _calmig_job_errors WHERE job_id = ? AND expires_at > ?",
        )
        .bind(job_id)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        match entries {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_errors(&self, job_id: &str, entries: &[ErrorEntry], ttl: Duration) -> Result<()> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp().saturating_add(ttl_secs);

        sqlx::query(
            "INSERT INTO _calmig_job_errors (job_id, entries, expires_at) VALUES (?, ?, ?)
             ON CONFLICT (job_id) DO UPDATE SET
                entries = excluded.entries,
                expires_at = excluded.expires_at",
        )
        .bind(job_id)
        .bind(serde_json::to_string(entries)?)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        debug!("Saved {} pending errors for job {}", entries.len(), job_id);
        Ok(())
    }

    async fn clear_errors(&self, job_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM _calmig_job_errors WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
