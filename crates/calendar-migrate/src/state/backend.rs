//! State backend trait for job state storage.
//!
//! Implementations:
//!
//! - **SQLite**: [`DbStateBackend`](super::DbStateBackend) in `db.rs`
//! - **Memory**: [`MemoryStateBackend`](super::MemoryStateBackend) in `memory.rs`
//!
//! The orchestrator works with `Arc<dyn StateBackend>` without knowing the
//! concrete type.

use std::time::Duration;

use async_trait::async_trait;

use super::MigrationStatus;
use crate::error::{MigrateError, Result};
use crate::report::ErrorEntry;

/// Trait for job state persistence backends.
///
/// # Example
///
/// ```rust,ignore
/// let backend: Arc<dyn StateBackend> = Arc::new(DbStateBackend::new(pool));
/// backend.init_schema().await?;
/// backend.save_status("job-1", &MigrationStatus::InProgress).await?;
/// ```
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Create the backing tables. Safe to call repeatedly.
    async fn init_schema(&self) -> Result<()>;

    /// Status of a job; `NotStarted` when nothing was saved yet.
    async fn load_status(&self, job_id: &str) -> Result<MigrationStatus>;

    async fn save_status(&self, job_id: &str, status: &MigrationStatus) -> Result<()>;

    /// Pending error entries. Entries whose TTL has passed are not returned.
    async fn load_errors(&self, job_id: &str) -> Result<Vec<ErrorEntry>>;

    /// Replace the pending error entries, expiring after `ttl`.
    async fn save_errors(&self, job_id: &str, entries: &[ErrorEntry], ttl: Duration)
        -> Result<()>;

    async fn clear_errors(&self, job_id: &str) -> Result<()>;

    /// Backend type name for logging.
    fn backend_type(&self) -> &'static str;
}

/// Convert a status to its stored name.
pub fn status_to_str(status: &MigrationStatus) -> &'static str {
    match status {
        MigrationStatus::NotStarted => "not_started",
        MigrationStatus::InProgress => "in_progress",
        MigrationStatus::Complete { .. } => "complete",
    }
}

/// Parse a stored status. `complete` needs its completion date.
pub fn str_to_status(
    s: &str,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<MigrationStatus> {
    match (s, completed_at) {
        ("not_started", _) => Ok(MigrationStatus::NotStarted),
        ("in_progress", _) => Ok(MigrationStatus::InProgress),
        ("complete", Some(completed_at)) => Ok(MigrationStatus::Complete { completed_at }),
        ("complete", None) => Err(MigrateError::State(
            "Complete status stored without a completion date".into(),
        )),
        _ => Err(MigrateError::State(format!("Invalid migration status: {}", s))),
    }
}
