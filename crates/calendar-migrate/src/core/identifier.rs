//! Identifier validation and table naming for dynamically built SQL.
//!
//! Table names cannot be bound as statement parameters, so the foreign and
//! mapping table names are assembled from configured prefixes. Prefixes are
//! restricted to `[A-Za-z0-9_]` and every assembled name is quoted before it
//! is interpolated into a query.

use crate::core::RecordType;
use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted for a table name.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Validate a configured table prefix.
///
/// Prefixes are concatenated with fixed table names, so only ASCII
/// alphanumerics and underscores are allowed.
pub fn validate_table_prefix(prefix: &str) -> Result<()> {
    validate_identifier(prefix)?;
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(MigrateError::Config(format!(
            "Table prefix may only contain letters, digits and underscores: {:?}",
            prefix
        )));
    }
    Ok(())
}

/// Quote a SQLite identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
pub fn quote_sqlite(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quoted names of the foreign plugin's tables.
#[derive(Debug, Clone)]
pub struct ForeignTables {
    pub events: String,
    pub locations: String,
    pub event_meta: String,
    pub tickets: String,
    pub orders: String,
    pub order_items: String,
}

impl ForeignTables {
    pub fn new(prefix: &str) -> Result<Self> {
        validate_table_prefix(prefix)?;
        Ok(Self {
            events: quote_sqlite(&format!("{}events", prefix))?,
            locations: quote_sqlite(&format!("{}locations", prefix))?,
            event_meta: quote_sqlite(&format!("{}event_meta", prefix))?,
            tickets: quote_sqlite(&format!("{}tickets", prefix))?,
            orders: quote_sqlite(&format!("{}orders", prefix))?,
            order_items: quote_sqlite(&format!("{}order_items", prefix))?,
        })
    }

    /// Source table and primary key column holding the items of one record type.
    pub fn source_of(&self, record_type: RecordType) -> (&str, &'static str) {
        match record_type {
            RecordType::Event => (&self.events, "event_id"),
            RecordType::Ticket => (&self.tickets, "ticket_id"),
            RecordType::Order => (&self.orders, "order_id"),
            RecordType::Attendee => (&self.order_items, "item_id"),
        }
    }
}

/// Quoted names of the four mapping tables.
#[derive(Debug, Clone)]
pub struct MappingTables {
    prefix: String,
    events: String,
    tickets: String,
    orders: String,
    attendees: String,
}

impl MappingTables {
    pub fn new(prefix: &str) -> Result<Self> {
        validate_table_prefix(prefix)?;
        Ok(Self {
            prefix: prefix.to_string(),
            events: quote_sqlite(&format!("{}events", prefix))?,
            tickets: quote_sqlite(&format!("{}tickets", prefix))?,
            orders: quote_sqlite(&format!("{}orders", prefix))?,
            attendees: quote_sqlite(&format!("{}attendees", prefix))?,
        })
    }

    /// Unquoted table name, as stored in `sqlite_master`.
    pub fn name(&self, record_type: RecordType) -> String {
        format!("{}{}", self.prefix, record_type.as_str())
    }

    /// Mapping table for one record type.
    pub fn table(&self, record_type: RecordType) -> &str {
        match record_type {
            RecordType::Event => &self.events,
            RecordType::Ticket => &self.tickets,
            RecordType::Order => &self.orders,
            RecordType::Attendee => &self.attendees,
        }
    }
}
