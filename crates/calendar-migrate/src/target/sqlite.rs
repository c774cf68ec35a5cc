//! SQLite writer for the native calendar schema.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

use super::{check_attendee, check_event, check_order, check_ticket, TIMESTAMP_FORMAT};
use crate::core::{
    AttendeeIdentity, CreatedEvent, NativeEventInput, NativeOrderInput, NativeTicketInput,
    TargetWriter,
};
use crate::error::Result;

/// Native schema. Events are split into a post (title, body, status) and the
/// event row carrying the schedule, location, recurrence and ticket
/// definition.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS calendars (
        calendar_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS posts (
        post_id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_type TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS events (
        event_id INTEGER PRIMARY KEY AUTOINCREMENT,
        legacy_id INTEGER NOT NULL UNIQUE,
        post_id INTEGER NOT NULL REFERENCES posts(post_id),
        calendar_id INTEGER NOT NULL REFERENCES calendars(calendar_id),
        start_at TEXT NOT NULL,
        end_at TEXT NOT NULL,
        timezone TEXT,
        all_day INTEGER NOT NULL DEFAULT 0,
        url TEXT,
        location TEXT,
        rrule TEXT,
        recurrence TEXT,
        ticket_price REAL,
        ticket_capacity INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS event_meta (
        meta_id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id INTEGER NOT NULL REFERENCES events(event_id),
        meta_key TEXT NOT NULL,
        meta_value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        order_id INTEGER PRIMARY KEY AUTOINCREMENT,
        legacy_id INTEGER NOT NULL UNIQUE,
        event_id INTEGER,
        status TEXT NOT NULL,
        subtotal REAL NOT NULL,
        tax REAL NOT NULL,
        total REAL NOT NULL,
        currency TEXT NOT NULL,
        email TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        created_at TEXT,
        paid_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS attendees (
        attendee_id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        UNIQUE (email, first_name, last_name)
    )",
    "CREATE TABLE IF NOT EXISTS tickets (
        ticket_id INTEGER PRIMARY KEY AUTOINCREMENT,
        legacy_id INTEGER NOT NULL UNIQUE,
        order_id INTEGER NOT NULL REFERENCES orders(order_id),
        event_id INTEGER,
        attendee_id INTEGER NOT NULL REFERENCES attendees(attendee_id)
    )",
];

/// Writer over the native tables of a SQLite database.
pub struct SqliteTargetWriter {
    pool: SqlitePool,
}

impl SqliteTargetWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the native tables if they are missing.
    pub async fn init_schema(&self) -> Result<()> {
        for sql in SCHEMA {
            sqlx::query(sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Native id of the row created earlier for a foreign id, if any.
    async fn existing_id(&self, table: &str, id_column: &str, legacy_id: i64) -> Result<Option<i64>> {
        let sql = format!("SELECT {} FROM {} WHERE legacy_id = ?", id_column, table);
        let id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(legacy_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl TargetWriter for SqliteTargetWriter {
    async fn ensure_calendar(&self, name: &str) -> Result<i64> {
        let inserted = sqlx::query("INSERT OR IGNORE INTO calendars (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if inserted.rows_affected() > 0 {
            info!("Created calendar '{}'", name);
        }

        let id: i64 = sqlx::query_scalar("SELECT calendar_id FROM calendars WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn create_event(&self, input: &NativeEventInput) -> Result<Option<CreatedEvent>> {
        let existing: Option<(i64, i64)> =
            sqlx::query_as("SELECT event_id, post_id FROM events WHERE legacy_id = ?")
                .bind(input.legacy_id)
                .fetch_optional(&self.pool)
                .await?;
        if let Some((event_id, post_id)) = existing {
            debug!("Event {} already created as {}", input.legacy_id, event_id);
            return Ok(Some(CreatedEvent { event_id, post_id }));
        }

        if let Some(reason) = check_event(input) {
            debug!("Rejected event '{}': {}", input.title, reason);
            return Ok(None);
        }

        let recurrence_json = input
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        let post_id = sqlx::query(
            "INSERT INTO posts (post_type, title, content, status) VALUES ('event', ?, ?, ?)",
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.status)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let event_id = sqlx::query(
            "INSERT INTO events
             (legacy_id, post_id, calendar_id, start_at, end_at, timezone, all_day, url, location, rrule, recurrence)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.legacy_id)
        .bind(post_id)
        .bind(input.calendar_id)
        .bind(input.start.format(TIMESTAMP_FORMAT).to_string())
        .bind(input.end.format(TIMESTAMP_FORMAT).to_string())
        .bind(&input.timezone)
        .bind(input.all_day)
        .bind(&input.url)
        .bind(&input.location)
        .bind(input.recurrence.as_ref().map(|r| r.to_rrule()))
        .bind(recurrence_json)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (key, value) in &input.meta {
            sqlx::query("INSERT INTO event_meta (event_id, meta_key, meta_value) VALUES (?, ?, ?)")
                .bind(event_id)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(CreatedEvent { event_id, post_id }))
    }

    async fn has_ticket_definition(&self, event_id: i64) -> Result<bool> {
        let defined: Option<i64> = sqlx::query_scalar(
            "SELECT ticket_capacity IS NOT NULL FROM events WHERE event_id = ?",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(defined.unwrap_or(0) != 0)
    }

    async fn attach_ticket_definition(
        &self,
        event_id: i64,
        price: f64,
        capacity: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE events SET ticket_price = ?, ticket_capacity = ?
             WHERE event_id = ? AND ticket_capacity IS NULL",
        )
        .bind(price)
        .bind(capacity)
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_order(&self, input: &NativeOrderInput) -> Result<Option<i64>> {
        if let Some(id) = self.existing_id("orders", "order_id", input.legacy_id).await? {
            debug!("Order {} already created as {}", input.legacy_id, id);
            return Ok(Some(id));
        }

        if let Some(reason) = check_order(input) {
            debug!("Rejected order for {}: {}", input.email, reason);
            return Ok(None);
        }

        let order_id = sqlx::query(
            "INSERT INTO orders
             (legacy_id, event_id, status, subtotal, tax, total, currency, email, first_name, last_name, created_at, paid_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.legacy_id)
        .bind(input.event_id)
        .bind(&input.status)
        .bind(input.subtotal)
        .bind(input.tax)
        .bind(input.total)
        .bind(&input.currency)
        .bind(&input.email)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(input.created_at.map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
        .bind(input.paid_at.map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(Some(order_id))
    }

    async fn order_event_id(&self, order_id: i64) -> Result<Option<i64>> {
        let event_id: Option<Option<i64>> =
            sqlx::query_scalar("SELECT event_id FROM orders WHERE order_id = ?")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(event_id.flatten().filter(|id| *id > 0))
    }

    async fn create_or_get_attendee(&self, identity: &AttendeeIdentity) -> Result<Option<i64>> {
        if let Some(reason) = check_attendee(identity) {
            debug!("Rejected attendee: {}", reason);
            return Ok(None);
        }

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT attendee_id FROM attendees
             WHERE email = ? AND first_name = ? AND last_name = ?",
        )
        .bind(&identity.email)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(id) = existing {
            debug!("Reusing attendee {} for {}", id, identity.email);
            return Ok(Some(id));
        }

        let id = sqlx::query("INSERT INTO attendees (email, first_name, last_name) VALUES (?, ?, ?)")
            .bind(&identity.email)
            .bind(&identity.first_name)
            .bind(&identity.last_name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(Some(id))
    }

    async fn create_ticket(&self, input: &NativeTicketInput) -> Result<Option<i64>> {
        if let Some(id) = self.existing_id("tickets", "ticket_id", input.legacy_id).await? {
            debug!("Ticket for purchase {} already created as {}", input.legacy_id, id);
            return Ok(Some(id));
        }

        if let Some(reason) = check_ticket(input) {
            debug!("Rejected ticket for order {}: {}", input.order_id, reason);
            return Ok(None);
        }

        let id = sqlx::query(
            "INSERT INTO tickets (legacy_id, order_id, event_id, attendee_id) VALUES (?, ?, ?, ?)",
        )
        .bind(input.legacy_id)
        .bind(input.order_id)
        .bind(input.event_id)
        .bind(input.attendee_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(Some(id))
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn writer_type(&self) -> &'static str {
        "sqlite"
    }
}
