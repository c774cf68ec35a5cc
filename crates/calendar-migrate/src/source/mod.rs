//! Foreign schema reader.
//!
//! Implements [`SourceReader`] over the foreign plugin's SQLite tables.
//! "Unmigrated" rows are found with an anti-join against the mapping
//! tables, so the reader never needs its own progress bookkeeping.

pub mod schema;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, warn};

use crate::core::identifier::{ForeignTables, MappingTables};
use crate::core::{
    ForeignAttendee, ForeignBatch, ForeignEvent, ForeignOrder, ForeignTicket, ForeignVenue,
    RecordType, SourceReader,
};
use crate::error::Result;
use crate::orchestrator::pools::table_exists;
use crate::recurrence::decode_recurrence;

pub use schema::create_foreign_tables;

/// Reader over the foreign plugin's tables.
pub struct SqliteSourceReader {
    pool: SqlitePool,
    foreign: ForeignTables,
    mapping: MappingTables,
    custom_fields: Vec<String>,
}

impl SqliteSourceReader {
    /// Create a reader.
    ///
    /// `custom_fields` is the allow-list of event meta keys carried over to
    /// the native event.
    pub fn new(
        pool: SqlitePool,
        table_prefix: &str,
        mapping_prefix: &str,
        custom_fields: Vec<String>,
    ) -> Result<Self> {
        Ok(Self {
            pool,
            foreign: ForeignTables::new(table_prefix)?,
            mapping: MappingTables::new(mapping_prefix)?,
            custom_fields,
        })
    }

    /// `FROM source LEFT JOIN mapping ... WHERE mapping row IS NULL`
    fn unmigrated_from(&self, record_type: RecordType) -> String {
        let (table, pk) = self.foreign.source_of(record_type);
        format!(
            "FROM {} s LEFT JOIN {} m ON m.foreign_id = s.{} WHERE m.foreign_id IS NULL",
            table,
            self.mapping.table(record_type),
            pk
        )
    }

    async fn fetch_events(&self, limit: i64) -> Result<Vec<ForeignEvent>> {
        let sql = format!(
            "SELECT s.event_id, s.title, s.content, s.status, s.start_date, s.end_date,
                    s.timezone, s.all_day, s.url, s.location_id, s.recurrence
             {} ORDER BY s.event_id LIMIT ?",
            self.unmigrated_from(RecordType::Event)
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("event_id")?;
            let location_id: Option<i64> = row.try_get("location_id")?;
            let recurrence: Option<String> = row.try_get("recurrence")?;
            let start_raw: Option<String> = row.try_get("start_date")?;
            let end_raw: Option<String> = row.try_get("end_date")?;

            let start = start_raw.as_deref().and_then(parse_timestamp);
            if start.is_none() {
                warn!("Event {} has an unreadable start date: {:?}", id, start_raw);
            }

            let venue = match location_id {
                Some(location_id) if location_id > 0 => self.load_venue(location_id).await?,
                _ => None,
            };

            events.push(ForeignEvent {
                id,
                title: row.try_get("title")?,
                content: row.try_get("content")?,
                status: row.try_get("status")?,
                start,
                end: end_raw.as_deref().and_then(parse_timestamp),
                timezone: non_empty(row.try_get("timezone")?),
                all_day: row.try_get::<i64, _>("all_day")? != 0,
                url: non_empty(row.try_get("url")?),
                venue,
                recurrence: recurrence.as_deref().and_then(decode_recurrence),
                custom_fields: self.load_custom_fields(id).await?,
            });
        }
        Ok(events)
    }

    async fn load_venue(&self, location_id: i64) -> Result<Option<ForeignVenue>> {
        let sql = format!(
            "SELECT name, address, city, region, postcode, country FROM {} WHERE location_id = ?",
            self.foreign.locations
        );
        let row = sqlx::query(&sql)
            .bind(location_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!("Location {} referenced but missing", location_id);
            return Ok(None);
        };
        Ok(Some(ForeignVenue {
            name: row.try_get("name")?,
            address: non_empty(row.try_get("address")?),
            city: non_empty(row.try_get("city")?),
            region: non_empty(row.try_get("region")?),
            postcode: non_empty(row.try_get("postcode")?),
            country: non_empty(row.try_get("country")?),
        }))
    }

    async fn load_custom_fields(&self, event_id: i64) -> Result<Vec<(String, String)>> {
        if self.custom_fields.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; self.custom_fields.len()].join(", ");
        let sql = format!(
            "SELECT meta_key, meta_value FROM {}
             WHERE event_id = ? AND meta_key IN ({})
             ORDER BY meta_key, meta_id",
            self.foreign.event_meta, placeholders
        );
        let mut query = sqlx::query(&sql).bind(event_id);
        for key in &self.custom_fields {
            query = query.bind(key);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<(String, String)> {
                let key: String = row.try_get("meta_key")?;
                let value: Option<String> = row.try_get("meta_value")?;
                Ok((key, value.unwrap_or_default()))
            })
            .collect()
    }

    async fn fetch_tickets(&self, limit: i64) -> Result<Vec<ForeignTicket>> {
        let sql = format!(
            "SELECT s.ticket_id, s.event_id, s.name, s.price, s.capacity
             {} ORDER BY s.ticket_id LIMIT ?",
            self.unmigrated_from(RecordType::Ticket)
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<ForeignTicket> {
                Ok(ForeignTicket {
                    id: row.try_get("ticket_id")?,
                    event_id: row.try_get("event_id")?,
                    name: row.try_get("name")?,
                    price: row.try_get("price")?,
                    capacity: row.try_get("capacity")?,
                })
            })
            .collect()
    }

    async fn fetch_orders(&self, limit: i64) -> Result<Vec<ForeignOrder>> {
        let sql = format!(
            "SELECT s.order_id, s.event_id, s.status, s.subtotal, s.tax, s.total, s.currency,
                    s.email, s.first_name, s.last_name, s.order_date
             {} ORDER BY s.order_id LIMIT ?",
            self.unmigrated_from(RecordType::Order)
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn fetch_attendees(&self, limit: i64) -> Result<Vec<ForeignAttendee>> {
        let sql = format!(
            "SELECT s.item_id, s.order_id, s.ticket_id, s.email, s.first_name, s.last_name
             {} ORDER BY s.item_id LIMIT ?",
            self.unmigrated_from(RecordType::Attendee)
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<ForeignAttendee> {
                Ok(ForeignAttendee {
                    id: row.try_get("item_id")?,
                    order_id: row.try_get("order_id")?,
                    ticket_id: row.try_get("ticket_id")?,
                    email: row.try_get("email")?,
                    first_name: row.try_get("first_name")?,
                    last_name: row.try_get("last_name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SourceReader for SqliteSourceReader {
    async fn count_unmigrated(&self, record_type: RecordType) -> Result<u64> {
        // Before the first run nothing is mapped yet.
        let sql = if table_exists(&self.pool, &self.mapping.name(record_type)).await? {
            format!("SELECT COUNT(*) {}", self.unmigrated_from(record_type))
        } else {
            format!("SELECT COUNT(*) FROM {}", self.foreign.source_of(record_type).0)
        };
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_unmigrated(
        &self,
        record_type: RecordType,
        limit: usize,
    ) -> Result<ForeignBatch> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let batch = match record_type {
            RecordType::Event => ForeignBatch::Events(self.fetch_events(limit).await?),
            RecordType::Ticket => ForeignBatch::Tickets(self.fetch_tickets(limit).await?),
            RecordType::Order => ForeignBatch::Orders(self.fetch_orders(limit).await?),
            RecordType::Attendee => ForeignBatch::Attendees(self.fetch_attendees(limit).await?),
        };
        debug!("Fetched {} unmigrated {}", batch.len(), record_type);
        Ok(batch)
    }

    async fn test_connection(&self) -> Result<()> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.foreign.events);
        let _: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(())
    }
}

fn order_from_row(row: &SqliteRow) -> Result<ForeignOrder> {
    let ordered_at: Option<String> = row.try_get("order_date")?;
    Ok(ForeignOrder {
        id: row.try_get("order_id")?,
        event_id: row.try_get("event_id")?,
        status: row.try_get("status")?,
        subtotal: row.try_get("subtotal")?,
        tax: row.try_get("tax")?,
        total: row.try_get("total")?,
        currency: row.try_get("currency")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        ordered_at: ordered_at.as_deref().and_then(parse_timestamp),
    })
}

/// Parse the plugin's timestamp formats. Date-only values are midnight;
/// zero dates are treated as missing.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() || s.starts_with("0000-00-00") {
        return None;
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
