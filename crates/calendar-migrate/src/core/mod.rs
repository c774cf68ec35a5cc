//! Core abstractions for the migration engine.
//!
//! - [`records`]: foreign and native record shapes
//! - [`traits`]: reader, mapping store and writer seams
//! - [`identifier`]: table naming and identifier validation

pub mod identifier;
pub mod records;
pub mod traits;

pub use records::{
    AttendeeIdentity, CreatedEvent, ForeignAttendee, ForeignBatch, ForeignEvent, ForeignOrder,
    ForeignTicket, ForeignVenue, NativeEventInput, NativeOrderInput, NativeTicketInput,
    RecordType,
};
pub use traits::{MappingOutcome, MappingStore, MigrationRecord, SourceReader, TargetWriter};
