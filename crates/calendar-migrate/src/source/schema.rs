//! Layout of the foreign plugin's tables.
//!
//! The reader only ever queries these tables. [`create_foreign_tables`]
//! exists to seed fixture databases with the same layout.

use sqlx::sqlite::SqlitePool;

use crate::core::identifier::ForeignTables;
use crate::error::Result;

/// Create the foreign tables under `prefix` if they are missing.
pub async fn create_foreign_tables(pool: &SqlitePool, prefix: &str) -> Result<ForeignTables> {
    let t = ForeignTables::new(prefix)?;

    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                event_id INTEGER PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'publish',
                start_date TEXT,
                end_date TEXT,
                timezone TEXT,
                all_day INTEGER NOT NULL DEFAULT 0,
                url TEXT,
                location_id INTEGER,
                recurrence TEXT
            )",
            t.events
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                location_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                address TEXT,
                city TEXT,
                region TEXT,
                postcode TEXT,
                country TEXT
            )",
            t.locations
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                meta_id INTEGER PRIMARY KEY,
                event_id INTEGER NOT NULL,
                meta_key TEXT NOT NULL,
                meta_value TEXT
            )",
            t.event_meta
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                ticket_id INTEGER PRIMARY KEY,
                event_id INTEGER NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                price REAL NOT NULL DEFAULT 0,
                capacity INTEGER NOT NULL DEFAULT -1
            )",
            t.tickets
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                order_id INTEGER PRIMARY KEY,
                event_id INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                subtotal REAL NOT NULL DEFAULT 0,
                tax REAL NOT NULL DEFAULT 0,
                total REAL NOT NULL DEFAULT 0,
                currency TEXT NOT NULL DEFAULT 'USD',
                email TEXT NOT NULL DEFAULT '',
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                order_date TEXT
            )",
            t.orders
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                item_id INTEGER PRIMARY KEY,
                order_id INTEGER NOT NULL,
                ticket_id INTEGER,
                email TEXT NOT NULL DEFAULT '',
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT ''
            )",
            t.order_items
        ),
    ];

    for sql in &statements {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(t)
}
