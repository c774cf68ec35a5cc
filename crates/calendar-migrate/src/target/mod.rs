//! Native schema writers.
//!
//! [`SqliteTargetWriter`] writes into the native calendar tables;
//! [`MemoryTargetWriter`] keeps everything in process and can be told to
//! reject specific items.
//!
//! Both enforce the same acceptance rules through the `check_*` functions
//! below. A failed check is a per-item rejection (`Ok(None)`), never an
//! error.

pub mod memory;
pub mod sqlite;

pub use crate::core::TargetWriter;
pub use memory::MemoryTargetWriter;
pub use sqlite::SqliteTargetWriter;

use crate::core::{AttendeeIdentity, NativeEventInput, NativeOrderInput, NativeTicketInput};

/// Timestamp format used for every native date column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reason an event would be rejected, if any.
pub fn check_event(input: &NativeEventInput) -> Option<&'static str> {
    if input.title.trim().is_empty() {
        return Some("event title is empty");
    }
    if input.end < input.start {
        return Some("event ends before it starts");
    }
    if input.calendar_id <= 0 {
        return Some("event has no calendar");
    }
    None
}

/// Reason an order would be rejected, if any.
pub fn check_order(input: &NativeOrderInput) -> Option<&'static str> {
    if input.email.trim().is_empty() {
        return Some("order has no purchaser email");
    }
    if input.total < 0.0 || input.subtotal < 0.0 || input.tax < 0.0 {
        return Some("order amounts are negative");
    }
    if input.status == "paid" && input.paid_at.is_none() {
        return Some("paid order has no payment date");
    }
    None
}

/// Reason an attendee identity would be rejected, if any.
pub fn check_attendee(identity: &AttendeeIdentity) -> Option<&'static str> {
    if identity.email.trim().is_empty() {
        return Some("attendee has no email");
    }
    None
}

/// Reason a ticket would be rejected, if any.
pub fn check_ticket(input: &NativeTicketInput) -> Option<&'static str> {
    if input.order_id <= 0 || input.attendee_id <= 0 {
        return Some("ticket references a missing order or attendee");
    }
    None
}
