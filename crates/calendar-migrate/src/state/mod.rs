//! Persisted job state: the migration status and the pending error log.
//!
//! Both are keyed by job id and stored through a [`StateBackend`], so a
//! process that runs a single batch and exits still sees the status and
//! errors left by earlier invocations.

pub mod backend;
pub mod db;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use backend::StateBackend;
pub use db::DbStateBackend;
pub use memory::MemoryStateBackend;

/// Overall status of a migration job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete { completed_at: DateTime<Utc> },
}

impl MigrationStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, MigrationStatus::Complete { .. })
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            MigrationStatus::Complete { completed_at } => Some(*completed_at),
            _ => None,
        }
    }
}
