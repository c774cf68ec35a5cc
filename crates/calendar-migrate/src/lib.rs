//! # calendar-migrate
//!
//! Resumable migration of a legacy events plugin's data into a native
//! calendar schema.
//!
//! Four linked record types move in dependency order:
//!
//! - **Events**, with venues, custom fields and recurrence rules
//! - **Tickets**, folded into the price and capacity of their event
//! - **Orders**, linked to their migrated event
//! - **Attendees**, de-duplicated and written as native tickets
//!
//! Progress is kept in mapping tables beside the foreign data, so the job
//! can be advanced one batch at a time by short-lived invocations and
//! resumed after any interruption.
//!
//! ## Example
//!
//! ```rust,no_run
//! use calendar_migrate::{AdvanceHints, Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> calendar_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let mut orchestrator = Orchestrator::from_config(&config).await?;
//!     let snapshot = orchestrator.advance(&AdvanceHints::default()).await?;
//!     println!("{:?}: {} processed", snapshot.phase, snapshot.processed_this_batch);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod importer;
pub mod mapping;
pub mod orchestrator;
pub mod recurrence;
pub mod report;
pub mod source;
pub mod state;
pub mod target;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{MappingStore, RecordType, SourceReader, TargetWriter};
pub use error::{MigrateError, Result};
pub use importer::BatchOutcome;
pub use mapping::SqliteMappingStore;
pub use orchestrator::{
    next_phase, AdvanceHints, ContextOptions, HealthCheckResult, MigrationContext, Orchestrator,
    Phase, PhaseCounts, ProgressSnapshot, ReportedPhase, SnapshotStatus, StatusReport,
};
pub use report::{ErrorEntry, ErrorGroup, ErrorReporter};
pub use source::SqliteSourceReader;
pub use state::{DbStateBackend, MemoryStateBackend, MigrationStatus, StateBackend};
pub use target::{MemoryTargetWriter, SqliteTargetWriter};
