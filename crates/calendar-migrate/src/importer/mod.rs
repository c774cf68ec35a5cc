//! Phase importers.
//!
//! Each importer takes one batch of foreign rows and, per item, either
//! writes the native equivalent and records the mapping, or records a
//! permanent skip. A skip caused by a writer rejection is also logged as an
//! error; a structural skip (missing parent, duplicate definition) is not.
//!
//! Storage failures abort the batch with `Err`. Items already recorded stay
//! recorded; the failing item has no mapping row and is fetched again by the
//! next batch.

pub mod attendees;
pub mod events;
pub mod orders;
pub mod tickets;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{
    ForeignBatch, MappingOutcome, MappingStore, RecordType, SourceReader, TargetWriter,
};
use crate::error::Result;
use crate::orchestrator::MigrationContext;

/// The three stores an importer talks to.
#[derive(Clone, Copy)]
pub struct PhaseIo<'a> {
    pub reader: &'a dyn SourceReader,
    pub mapping: &'a dyn MappingStore,
    pub writer: &'a dyn TargetWriter,
}

/// Per-batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Items taken from the batch.
    pub processed: u64,
    pub migrated: u64,
    /// Structural skips.
    pub skipped: u64,
    /// Writer rejections.
    pub failed: u64,
}

impl PhaseIo<'_> {
    async fn migrated(
        &self,
        outcome: &mut BatchOutcome,
        record_type: RecordType,
        foreign_id: i64,
        native_id: i64,
    ) -> Result<()> {
        self.mapping
            .record(record_type, foreign_id, MappingOutcome::Migrated(native_id))
            .await?;
        debug!("{} {} -> {}", record_type.label(), foreign_id, native_id);
        outcome.migrated += 1;
        Ok(())
    }

    async fn skipped(
        &self,
        outcome: &mut BatchOutcome,
        record_type: RecordType,
        foreign_id: i64,
        reason: &str,
    ) -> Result<()> {
        self.mapping
            .record(record_type, foreign_id, MappingOutcome::Skipped)
            .await?;
        debug!("{} {} skipped: {}", record_type.label(), foreign_id, reason);
        outcome.skipped += 1;
        Ok(())
    }

    async fn failed(
        &self,
        ctx: &mut MigrationContext,
        outcome: &mut BatchOutcome,
        record_type: RecordType,
        foreign_id: i64,
        display_name: String,
    ) -> Result<()> {
        ctx.log_error(record_type, foreign_id, display_name).await?;
        self.mapping
            .record(record_type, foreign_id, MappingOutcome::Skipped)
            .await?;
        outcome.failed += 1;
        Ok(())
    }
}

/// Fetch and import up to `limit` rows of `record_type`.
pub async fn run_batch(
    io: &PhaseIo<'_>,
    ctx: &mut MigrationContext,
    record_type: RecordType,
    limit: usize,
) -> Result<BatchOutcome> {
    let batch = io.reader.fetch_unmigrated(record_type, limit).await?;

    match batch {
        ForeignBatch::Events(rows) => events::import(io, ctx, rows).await,
        ForeignBatch::Tickets(rows) => tickets::import(io, ctx, rows).await,
        ForeignBatch::Orders(rows) => orders::import(io, ctx, rows).await,
        ForeignBatch::Attendees(rows) => attendees::import(io, ctx, rows).await,
    }
}
