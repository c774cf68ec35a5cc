//! Record types moved by the migration, in their foreign and native shapes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};
use crate::recurrence::{ForeignRecurrence, NativeRecurrenceRule};

/// The four linked record types, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "events")]
    Event,
    #[serde(rename = "tickets")]
    Ticket,
    #[serde(rename = "orders")]
    Order,
    #[serde(rename = "attendees")]
    Attendee,
}

impl RecordType {
    /// All record types in migration order.
    pub const ALL: [RecordType; 4] = [
        RecordType::Event,
        RecordType::Ticket,
        RecordType::Order,
        RecordType::Attendee,
    ];

    /// Plural key used in snapshots and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Event => "events",
            RecordType::Ticket => "tickets",
            RecordType::Order => "orders",
            RecordType::Attendee => "attendees",
        }
    }

    /// Human-readable singular label.
    pub fn label(&self) -> &'static str {
        match self {
            RecordType::Event => "Event",
            RecordType::Ticket => "Ticket",
            RecordType::Order => "Order",
            RecordType::Attendee => "Attendee",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordType {
    type Err = MigrateError;

    /// Parse the plural key (`events`, `tickets`, ...).
    fn from_str(s: &str) -> Result<Self> {
        RecordType::ALL
            .into_iter()
            .find(|rt| rt.as_str() == s)
            .ok_or_else(|| MigrateError::Config(format!("Unknown record type: {}", s)))
    }
}

/// Venue attached to a foreign event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeignVenue {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

impl ForeignVenue {
    /// Single-line location string: the venue name followed by the
    /// non-empty address parts.
    pub fn formatted(&self) -> String {
        let parts = [
            Some(self.name.as_str()),
            self.address.as_deref(),
            self.city.as_deref(),
            self.region.as_deref(),
            self.postcode.as_deref(),
            self.country.as_deref(),
        ];
        parts
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Full projection of a foreign event.
#[derive(Debug, Clone)]
pub struct ForeignEvent {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub status: String,
    /// `None` when the stored value could not be parsed.
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub timezone: Option<String>,
    pub all_day: bool,
    pub url: Option<String>,
    pub venue: Option<ForeignVenue>,
    pub recurrence: Option<ForeignRecurrence>,
    /// Allow-listed meta values, in key order.
    pub custom_fields: Vec<(String, String)>,
}

/// A foreign ticket definition: price and capacity offered for one event.
#[derive(Debug, Clone)]
pub struct ForeignTicket {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub price: f64,
    /// `-1` means unlimited.
    pub capacity: i64,
}

/// A foreign order (booking) against one event.
#[derive(Debug, Clone)]
pub struct ForeignOrder {
    pub id: i64,
    pub event_id: Option<i64>,
    pub status: String,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub ordered_at: Option<NaiveDateTime>,
}

impl ForeignOrder {
    pub fn display_name(&self) -> String {
        let name = full_name(&self.first_name, &self.last_name);
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }
}

/// A foreign ticket purchase: one seat bought within an order.
#[derive(Debug, Clone)]
pub struct ForeignAttendee {
    pub id: i64,
    pub order_id: i64,
    pub ticket_id: Option<i64>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl ForeignAttendee {
    pub fn display_name(&self) -> String {
        let name = full_name(&self.first_name, &self.last_name);
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }

    pub fn identity(&self) -> AttendeeIdentity {
        AttendeeIdentity {
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// One batch of unmigrated foreign rows.
#[derive(Debug, Clone)]
pub enum ForeignBatch {
    Events(Vec<ForeignEvent>),
    Tickets(Vec<ForeignTicket>),
    Orders(Vec<ForeignOrder>),
    Attendees(Vec<ForeignAttendee>),
}

impl ForeignBatch {
    pub fn len(&self) -> usize {
        match self {
            ForeignBatch::Events(rows) => rows.len(),
            ForeignBatch::Tickets(rows) => rows.len(),
            ForeignBatch::Orders(rows) => rows.len(),
            ForeignBatch::Attendees(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Input for creating a native event.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEventInput {
    /// Foreign event id. Creating the same foreign event twice returns the
    /// first native event.
    pub legacy_id: i64,
    pub calendar_id: i64,
    pub title: String,
    pub content: String,
    pub status: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub timezone: Option<String>,
    pub all_day: bool,
    pub url: Option<String>,
    pub location: Option<String>,
    pub recurrence: Option<NativeRecurrenceRule>,
    pub meta: Vec<(String, String)>,
}

/// Identifiers of a freshly created native event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedEvent {
    pub event_id: i64,
    pub post_id: i64,
}

/// Input for creating a native order.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeOrderInput {
    /// Foreign order id; creates are idempotent on it.
    pub legacy_id: i64,
    /// Native event, `None` when the foreign event did not migrate.
    pub event_id: Option<i64>,
    pub status: String,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: Option<NaiveDateTime>,
    pub paid_at: Option<NaiveDateTime>,
}

/// Exact identity used to de-duplicate native attendees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendeeIdentity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Input for creating a native ticket (one purchased seat).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeTicketInput {
    /// Foreign purchase (attendee) id; creates are idempotent on it.
    pub legacy_id: i64,
    pub order_id: i64,
    pub event_id: Option<i64>,
    pub attendee_id: i64,
}

fn full_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_from_key() {
        assert_eq!("tickets".parse::<RecordType>().unwrap(), RecordType::Ticket);
        assert_eq!("attendees".parse::<RecordType>().unwrap(), RecordType::Attendee);
        assert!("ticket".parse::<RecordType>().is_err());
    }

    #[test]
    fn test_venue_formatted_skips_empty_parts() {
        let venue = ForeignVenue {
            name: "Town Hall".into(),
            address: Some("1 Main St".into()),
            city: Some("".into()),
            region: None,
            postcode: Some("12345".into()),
            country: Some("US".into()),
        };
        assert_eq!(venue.formatted(), "Town Hall, 1 Main St, 12345, US");
    }

    #[test]
    fn test_attendee_display_name_falls_back_to_email() {
        let attendee = ForeignAttendee {
            id: 1,
            order_id: 1,
            ticket_id: None,
            email: "sam@example.com".into(),
            first_name: " ".into(),
            last_name: "".into(),
        };
        assert_eq!(attendee.display_name(), "sam@example.com");
    }

    #[test]
    fn test_record_type_serializes_plural() {
        let json = serde_json::to_string(&RecordType::Attendee).unwrap();
        assert_eq!(json, "\"attendees\"");
        assert_eq!(RecordType::Ticket.label(), "Ticket");
    }
}
