//! Core traits at the seams of the migration engine.
//!
//! - [`SourceReader`]: reads unmigrated rows from the foreign schema
//! - [`MappingStore`]: records `foreign_id -> native_id` correspondences
//! - [`TargetWriter`]: creates records in the native schema
//!
//! The orchestrator and importers only see these traits, so the engine can
//! be driven against SQLite, another store, or in-memory doubles.

use async_trait::async_trait;

use crate::error::Result;

use super::records::{
    AttendeeIdentity, CreatedEvent, ForeignBatch, NativeEventInput, NativeOrderInput,
    NativeTicketInput, RecordType,
};

/// Read-only access to the foreign schema.
///
/// Both queries are anti-joins against the mapping store: a foreign row is
/// "unmigrated" while no mapping row exists for its id.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Count foreign rows of one type that have no mapping row yet.
    async fn count_unmigrated(&self, record_type: RecordType) -> Result<u64>;

    /// Fetch up to `limit` unmigrated rows of one type, ordered by foreign id.
    ///
    /// Rows are returned as full projections: events include their venue,
    /// allow-listed custom fields and decoded recurrence rule.
    async fn fetch_unmigrated(&self, record_type: RecordType, limit: usize)
        -> Result<ForeignBatch>;

    /// Check connectivity to the foreign database.
    async fn test_connection(&self) -> Result<()>;
}

/// Outcome recorded for one foreign item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOutcome {
    /// Written to the native schema under this id.
    Migrated(i64),
    /// Permanently skipped; never retried.
    Skipped,
}

/// One row of a mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationRecord {
    pub foreign_id: i64,
    pub native_id: Option<i64>,
    pub migrated: bool,
}

/// Persisted correspondence between foreign and native ids.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Create the four mapping tables if they do not exist.
    async fn init_schema(&self) -> Result<()>;

    /// Record the outcome for a foreign item. A second record for the same
    /// item is ignored: the first outcome wins.
    async fn record(
        &self,
        record_type: RecordType,
        foreign_id: i64,
        outcome: MappingOutcome,
    ) -> Result<()>;

    /// Look up the mapping row for a foreign item.
    async fn lookup(&self, record_type: RecordType, foreign_id: i64)
        -> Result<Option<MigrationRecord>>;

    /// Number of mapping rows for one type.
    async fn count(&self, record_type: RecordType) -> Result<u64>;

    /// Drop all four mapping tables.
    async fn drop_all(&self) -> Result<()>;

    /// Resolve a foreign id to its native id, only if it migrated successfully.
    async fn resolve(&self, record_type: RecordType, foreign_id: i64) -> Result<Option<i64>> {
        Ok(self
            .lookup(record_type, foreign_id)
            .await?
            .filter(|r| r.migrated)
            .and_then(|r| r.native_id)
            .filter(|id| *id > 0))
    }
}

/// Create operations against the native schema.
///
/// Create methods return `Ok(None)` when the native side rejects the item;
/// that is a per-item failure. `Err` is reserved for storage failures.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Find or create the calendar imported events are assigned to.
    async fn ensure_calendar(&self, name: &str) -> Result<i64>;

    async fn create_event(&self, input: &NativeEventInput) -> Result<Option<CreatedEvent>>;

    /// Whether the native event already carries a ticket definition.
    async fn has_ticket_definition(&self, event_id: i64) -> Result<bool>;

    /// Attach price and capacity to a native event. `false` when the event
    /// does not accept the definition.
    async fn attach_ticket_definition(&self, event_id: i64, price: f64, capacity: i64)
        -> Result<bool>;

    async fn create_order(&self, input: &NativeOrderInput) -> Result<Option<i64>>;

    /// Native event a native order belongs to.
    async fn order_event_id(&self, order_id: i64) -> Result<Option<i64>>;

    /// Return the attendee matching the identity exactly, creating it if needed.
    async fn create_or_get_attendee(&self, identity: &AttendeeIdentity) -> Result<Option<i64>>;

    async fn create_ticket(&self, input: &NativeTicketInput) -> Result<Option<i64>>;

    /// Check connectivity to the native database.
    async fn test_connection(&self) -> Result<()>;

    /// Writer type name for logging.
    fn writer_type(&self) -> &'static str;
}
