//! In-process state backend.
//!
//! Used when the engine is hosted by a long-lived process that drives
//! `advance` itself, and by tests. Nothing survives a restart.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::report::ErrorEntry;
use crate::state::backend::StateBackend;
use crate::state::MigrationStatus;

#[derive(Debug, Default)]
struct Jobs {
    status: HashMap<String, MigrationStatus>,
    errors: HashMap<String, (Vec<ErrorEntry>, DateTime<Utc>)>,
}

/// State backend holding everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStateBackend {
    jobs: Mutex<Jobs>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn load_status(&self, job_id: &str) -> Result<MigrationStatus> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.status.get(job_id).copied().unwrap_or_default())
    }

    async fn save_status(&self, job_id: &str, status: &MigrationStatus) -> Result<()> {
        self.jobs
            .lock()
            .await
            .status
            .insert(job_id.to_string(), *status);
        Ok(())
    }

    async fn load_errors(&self, job_id: &str) -> Result<Vec<ErrorEntry>> {
        let jobs = self.jobs.lock().await;
        Ok(match jobs.errors.get(job_id) {
            Some((entries, expires_at)) if *expires_at > Utc::now() => entries.clone(),
            _ => Vec::new(),
        })
    }

    async fn save_errors(&self, job_id: &str, entries: &[ErrorEntry], ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.jobs
            .lock()
            .await
            .errors
            .insert(job_id.to_string(), (entries.to_vec(), expires_at));
        Ok(())
    }

    async fn clear_errors(&self, job_id: &str) -> Result<()> {
        self.jobs.lock().await.errors.remove(job_id);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
