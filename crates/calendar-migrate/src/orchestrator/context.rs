//! Per-job context passed to every importer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::MigrationConfig;
use crate::core::RecordType;
use crate::error::Result;
use crate::report::ErrorReporter;
use crate::state::{MigrationStatus, StateBackend};

/// Knobs the importers read, resolved from [`MigrationConfig`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub batch_sizes: BTreeMap<RecordType, usize>,
    pub default_calendar: String,
    pub unlimited_capacity: i64,
    pub error_ttl: Duration,
}

impl ContextOptions {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            batch_sizes: RecordType::ALL
                .into_iter()
                .map(|rt| (rt, config.batch_size_for(rt)))
                .collect(),
            default_calendar: config.default_calendar.clone(),
            unlimited_capacity: config.unlimited_capacity,
            error_ttl: Duration::from_secs(config.error_ttl_secs),
        }
    }

    pub fn batch_size(&self, record_type: RecordType) -> usize {
        self.batch_sizes.get(&record_type).copied().unwrap_or(10)
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

/// Status, caches and error log of one job.
pub struct MigrationContext {
    job_id: String,
    status: MigrationStatus,
    totals: Option<BTreeMap<RecordType, u64>>,
    calendar_id: Option<i64>,
    errors: ErrorReporter,
    state: Arc<dyn StateBackend>,
    options: ContextOptions,
}

impl MigrationContext {
    /// Load the job's status and pending errors from the backend.
    pub async fn load(
        job_id: impl Into<String>,
        state: Arc<dyn StateBackend>,
        options: ContextOptions,
    ) -> Result<Self> {
        let job_id = job_id.into();
        let status = state.load_status(&job_id).await?;
        let errors = ErrorReporter::from_entries(state.load_errors(&job_id).await?);
        Ok(Self {
            job_id,
            status,
            totals: None,
            calendar_id: None,
            errors,
            state,
            options,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn status(&self) -> MigrationStatus {
        self.status
    }

    pub fn state_backend_type(&self) -> &'static str {
        self.state.backend_type()
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn errors(&self) -> &ErrorReporter {
        &self.errors
    }

    pub fn totals(&self) -> Option<&BTreeMap<RecordType, u64>> {
        self.totals.as_ref()
    }

    pub fn set_totals(&mut self, totals: BTreeMap<RecordType, u64>) {
        self.totals = Some(totals);
    }

    pub fn calendar_id(&self) -> Option<i64> {
        self.calendar_id
    }

    pub fn set_calendar_id(&mut self, id: i64) {
        self.calendar_id = Some(id);
    }

    /// Persist a new status.
    pub async fn set_status(&mut self, status: MigrationStatus) -> Result<()> {
        self.state.save_status(&self.job_id, &status).await?;
        self.status = status;
        Ok(())
    }

    /// Record a per-item failure.
    ///
    /// The persisted log is re-read before appending so entries written by
    /// earlier invocations are kept. An item already in the log is not
    /// added again.
    pub async fn log_error(
        &mut self,
        record_type: RecordType,
        foreign_id: i64,
        display_name: impl Into<String>,
    ) -> Result<()> {
        let display_name = display_name.into();
        let mut errors = ErrorReporter::from_entries(self.state.load_errors(&self.job_id).await?);
        if !errors.log(record_type, foreign_id, display_name.as_str()) {
            debug!("{} {} already logged", record_type.label(), foreign_id);
            self.errors = errors;
            return Ok(());
        }
        warn!(
            "{} {} ({}) could not be migrated",
            record_type.label(),
            foreign_id,
            display_name
        );

        self.state
            .save_errors(&self.job_id, errors.entries(), self.options.error_ttl)
            .await?;
        self.errors = errors;
        Ok(())
    }

    /// Re-read the persisted error log.
    pub async fn reload_errors(&mut self) -> Result<&ErrorReporter> {
        self.errors = ErrorReporter::from_entries(self.state.load_errors(&self.job_id).await?);
        Ok(&self.errors)
    }

    /// Drop the persisted error log.
    pub async fn clear_errors(&mut self) -> Result<()> {
        self.state.clear_errors(&self.job_id).await?;
        self.errors = ErrorReporter::new();
        Ok(())
    }
}
