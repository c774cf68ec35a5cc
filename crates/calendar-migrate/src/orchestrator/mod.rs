//! Migration orchestrator: the phase state machine.
//!
//! ```text
//! NotStarted -> Events -> Tickets -> Orders -> Attendees -> Complete
//! ```
//!
//! Every [`Orchestrator::advance`] call runs at most one batch of one phase
//! and returns a [`ProgressSnapshot`]. Progress itself lives in the mapping
//! tables, so a job can be driven by one long-lived process or by a series
//! of short invocations that each call `advance` once.

pub mod context;
pub mod pools;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::core::{MappingStore, RecordType, SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::importer::{run_batch, BatchOutcome, PhaseIo};
use crate::mapping::SqliteMappingStore;
use crate::report::{render_summary, ErrorGroup};
use crate::source::SqliteSourceReader;
use crate::state::{DbStateBackend, MigrationStatus, StateBackend};
use crate::target::SqliteTargetWriter;

pub use context::{ContextOptions, MigrationContext};
pub use pools::Pools;

/// Position in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Events,
    Tickets,
    Orders,
    Attendees,
    Complete,
}

impl Phase {
    pub fn for_record_type(record_type: RecordType) -> Self {
        match record_type {
            RecordType::Event => Phase::Events,
            RecordType::Ticket => Phase::Tickets,
            RecordType::Order => Phase::Orders,
            RecordType::Attendee => Phase::Attendees,
        }
    }

    /// Record type imported by this phase.
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            Phase::Events => Some(RecordType::Event),
            Phase::Tickets => Some(RecordType::Ticket),
            Phase::Orders => Some(RecordType::Order),
            Phase::Attendees => Some(RecordType::Attendee),
            Phase::NotStarted | Phase::Complete => None,
        }
    }

    /// Phase as shown to callers. Ticket definitions are folded into events
    /// on the native side, so that phase is reported as `hidden`.
    pub fn reported(&self) -> ReportedPhase {
        match self {
            Phase::NotStarted | Phase::Events => ReportedPhase::Events,
            Phase::Tickets => ReportedPhase::Hidden,
            Phase::Orders => ReportedPhase::Orders,
            Phase::Attendees => ReportedPhase::Attendees,
            Phase::Complete => ReportedPhase::Complete,
        }
    }
}

/// Phase name in a [`ProgressSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedPhase {
    Events,
    Hidden,
    Orders,
    Attendees,
    Complete,
}

impl ReportedPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportedPhase::Events => "events",
            ReportedPhase::Hidden => "hidden",
            ReportedPhase::Orders => "orders",
            ReportedPhase::Attendees => "attendees",
            ReportedPhase::Complete => "complete",
        }
    }
}

/// Unmigrated rows per record type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub events: u64,
    pub tickets: u64,
    pub orders: u64,
    pub attendees: u64,
}

impl PhaseCounts {
    pub fn get(&self, record_type: RecordType) -> u64 {
        match record_type {
            RecordType::Event => self.events,
            RecordType::Ticket => self.tickets,
            RecordType::Order => self.orders,
            RecordType::Attendee => self.attendees,
        }
    }

    pub fn set(&mut self, record_type: RecordType, count: u64) {
        match record_type {
            RecordType::Event => self.events = count,
            RecordType::Ticket => self.tickets = count,
            RecordType::Order => self.orders = count,
            RecordType::Attendee => self.attendees = count,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        RecordType::ALL.into_iter().all(|rt| self.get(rt) == 0)
    }
}

/// Next phase to run: the first phase, in dependency order, that still has
/// unmigrated rows. `Complete` is terminal.
pub fn next_phase(current: Phase, remaining: &PhaseCounts) -> Phase {
    if current == Phase::Complete {
        return Phase::Complete;
    }
    RecordType::ALL
        .into_iter()
        .find(|rt| remaining.get(*rt) > 0)
        .map(Phase::for_record_type)
        .unwrap_or(Phase::Complete)
}

/// Overall status as reported in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    InProgress,
    Complete,
}

/// Result of one `advance` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: String,
    /// Identifies the orchestrator instance that produced the snapshot.
    pub run_id: String,
    pub phase: ReportedPhase,
    pub totals: BTreeMap<RecordType, u64>,
    pub processed_this_batch: u64,
    pub batch: BatchOutcome,
    pub status: SnapshotStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failures grouped by record type; only filled on completion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_summary: Vec<ErrorGroup>,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.status == SnapshotStatus::Complete
    }

    /// Text rendering of the error summary; empty when nothing failed.
    pub fn render_errors(&self) -> String {
        render_summary(&self.error_summary)
    }
}

/// Caller-supplied hints for one `advance` call.
#[derive(Debug, Clone, Default)]
pub struct AdvanceHints {
    /// Totals to report instead of counting them.
    pub totals: Option<BTreeMap<RecordType, u64>>,
    /// Batch size for this call, overriding the configured per-phase sizes.
    pub batch_size: Option<usize>,
}

/// Job status plus what is left to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub job_id: String,
    pub status: MigrationStatus,
    pub remaining: PhaseCounts,
    pub pending_errors: usize,
}

/// Health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub state_backend: String,
    pub healthy: bool,
}

/// Migration orchestrator.
pub struct Orchestrator {
    run_id: String,
    reader: Arc<dyn SourceReader>,
    mapping: Arc<dyn MappingStore>,
    writer: Arc<dyn TargetWriter>,
    ctx: MigrationContext,
    phase: Phase,
    final_summary: Vec<ErrorGroup>,
    read_only: bool,
}

impl Orchestrator {
    /// Assemble an orchestrator from its parts. The mapping tables must
    /// already exist unless the job is complete.
    pub fn new(
        reader: Arc<dyn SourceReader>,
        mapping: Arc<dyn MappingStore>,
        writer: Arc<dyn TargetWriter>,
        ctx: MigrationContext,
    ) -> Self {
        let phase = if ctx.status().is_complete() {
            Phase::Complete
        } else {
            Phase::NotStarted
        };
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            reader,
            mapping,
            writer,
            ctx,
            phase,
            final_summary: Vec::new(),
            read_only: false,
        }
    }

    /// Open both databases and build the SQLite-backed engine.
    ///
    /// Job state is always kept in the target database, so every invocation
    /// against the same config sees the same job.
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::open(config, false).await
    }

    /// Open both databases without creating any table.
    ///
    /// For `status_report` and `health_check`; `advance` fails on the
    /// returned orchestrator.
    pub async fn open_read_only(config: &Config) -> Result<Self> {
        Self::open(config, true).await
    }

    async fn open(config: &Config, read_only: bool) -> Result<Self> {
        let pools = Pools::from_config(config).await?;

        let state: Arc<dyn StateBackend> = Arc::new(DbStateBackend::new(pools.target.clone()));
        let writer = SqliteTargetWriter::new(pools.target.clone());
        if !read_only {
            state.init_schema().await?;
            writer.init_schema().await?;
        }

        let mapping = SqliteMappingStore::new(pools.source.clone(), &config.migration.mapping_prefix)?;
        let reader = SqliteSourceReader::new(
            pools.source.clone(),
            &config.source.table_prefix,
            &config.migration.mapping_prefix,
            config.migration.custom_fields.clone(),
        )?;

        let ctx = MigrationContext::load(
            config.job_id(),
            state.clone(),
            ContextOptions::from_config(&config.migration),
        )
        .await?;

        // Mapping tables are dropped on completion; do not bring them back.
        if !read_only && !ctx.status().is_complete() {
            mapping.init_schema().await?;
        }

        debug!(
            "Using {} state backend and {} writer",
            state.backend_type(),
            writer.writer_type()
        );
        let mut orchestrator = Self::new(
            Arc::new(reader),
            Arc::new(mapping),
            Arc::new(writer),
            ctx,
        );
        orchestrator.read_only = read_only;
        Ok(orchestrator)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn context(&self) -> &MigrationContext {
        &self.ctx
    }

    /// Unmigrated rows per type. All zero once the job is complete.
    pub async fn remaining(&self) -> Result<PhaseCounts> {
        let mut counts = PhaseCounts::default();
        if self.ctx.status().is_complete() {
            return Ok(counts);
        }
        for record_type in RecordType::ALL {
            counts.set(record_type, self.reader.count_unmigrated(record_type).await?);
        }
        Ok(counts)
    }

    /// Per-type totals: unmigrated plus already mapped. Cached after the
    /// first call; caller hints replace the cache.
    async fn totals(&mut self, hints: &AdvanceHints) -> Result<BTreeMap<RecordType, u64>> {
        if let Some(totals) = &hints.totals {
            self.ctx.set_totals(totals.clone());
        }
        if let Some(totals) = self.ctx.totals() {
            return Ok(totals.clone());
        }

        let mut totals = BTreeMap::new();
        for record_type in RecordType::ALL {
            let pending = self.reader.count_unmigrated(record_type).await?;
            let mapped = self.mapping.count(record_type).await?;
            totals.insert(record_type, pending + mapped);
        }
        self.ctx.set_totals(totals.clone());
        Ok(totals)
    }

    /// Run at most one batch of the first unfinished phase.
    ///
    /// When no work remains after the batch, the job is completed within the
    /// same call. Once complete, further calls change nothing and return the
    /// completion snapshot.
    pub async fn advance(&mut self, hints: &AdvanceHints) -> Result<ProgressSnapshot> {
        if self.read_only {
            return Err(MigrateError::State(format!(
                "Job {} was opened read-only and cannot advance",
                self.ctx.job_id()
            )));
        }
        if self.ctx.status().is_complete() {
            self.phase = Phase::Complete;
            let totals = self.ctx.totals().cloned().unwrap_or_default();
            return Ok(self.snapshot(totals, BatchOutcome::default()));
        }

        if self.ctx.status() == MigrationStatus::NotStarted {
            info!("Starting migration job {}", self.ctx.job_id());
            self.ctx.set_status(MigrationStatus::InProgress).await?;
        }

        let totals = self.totals(hints).await?;
        let remaining = self.remaining().await?;
        let phase = next_phase(self.phase, &remaining);

        let outcome = match phase.record_type() {
            Some(record_type) => {
                let limit = hints
                    .batch_size
                    .unwrap_or_else(|| self.ctx.options().batch_size(record_type));
                if phase != self.phase {
                    info!(
                        "Phase {:?}: {} {} to migrate",
                        phase,
                        remaining.get(record_type),
                        record_type
                    );
                }

                let io = PhaseIo {
                    reader: self.reader.as_ref(),
                    mapping: self.mapping.as_ref(),
                    writer: self.writer.as_ref(),
                };
                let outcome = run_batch(&io, &mut self.ctx, record_type, limit).await?;
                info!(
                    "{}: {} processed ({} migrated, {} skipped, {} failed)",
                    record_type, outcome.processed, outcome.migrated, outcome.skipped, outcome.failed
                );
                outcome
            }
            None => BatchOutcome::default(),
        };
        self.phase = phase;

        if self.remaining().await?.is_exhausted() {
            self.complete().await?;
        }

        Ok(self.snapshot(totals, outcome))
    }

    /// Finish the job: capture the error summary, mark the job complete,
    /// then drop the mapping tables and the persisted error log.
    async fn complete(&mut self) -> Result<()> {
        let summary = self.ctx.reload_errors().await?.summary();

        let completed_at = Utc::now();
        self.ctx
            .set_status(MigrationStatus::Complete { completed_at })
            .await?;
        self.mapping.drop_all().await?;
        self.ctx.clear_errors().await?;

        let failed: usize = summary.iter().map(|g| g.errors.len()).sum();
        info!(
            "Migration job {} complete: {} items could not be migrated",
            self.ctx.job_id(),
            failed
        );
        self.phase = Phase::Complete;
        self.final_summary = summary;
        Ok(())
    }

    fn snapshot(&self, totals: BTreeMap<RecordType, u64>, batch: BatchOutcome) -> ProgressSnapshot {
        let status = self.ctx.status();
        ProgressSnapshot {
            job_id: self.ctx.job_id().to_string(),
            run_id: self.run_id.clone(),
            phase: self.phase.reported(),
            totals,
            processed_this_batch: batch.processed,
            batch,
            status: if status.is_complete() {
                SnapshotStatus::Complete
            } else {
                SnapshotStatus::InProgress
            },
            completed_at: status.completed_at(),
            error_summary: self.final_summary.clone(),
        }
    }

    /// Call `advance` until the job completes, checking `cancel` between
    /// batches.
    pub async fn run_to_completion<F>(
        &mut self,
        hints: &AdvanceHints,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<ProgressSnapshot>
    where
        F: FnMut(&ProgressSnapshot),
    {
        loop {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping before the next batch");
                return Err(MigrateError::Cancelled);
            }
            let snapshot = self.advance(hints).await?;
            on_progress(&snapshot);
            if snapshot.is_complete() {
                return Ok(snapshot);
            }
        }
    }

    /// Current status and remaining work.
    pub async fn status_report(&mut self) -> Result<StatusReport> {
        let pending_errors = self.ctx.reload_errors().await?.len();
        Ok(StatusReport {
            job_id: self.ctx.job_id().to_string(),
            status: self.ctx.status(),
            remaining: self.remaining().await?,
            pending_errors,
        })
    }

    /// Test connectivity to both databases.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.reader.test_connection().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.writer.test_connection().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        Ok(HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.as_ref().err().map(|e| e.to_string()),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.as_ref().err().map(|e| e.to_string()),
            state_backend: self.ctx.state_backend_type().to_string(),
            healthy: source.is_ok() && target.is_ok(),
        })
    }
}
