//! End-to-end migration tests driving the orchestrator against SQLite
//! foreign tables.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use calendar_migrate::core::{MappingOutcome, MigrationRecord};
use calendar_migrate::orchestrator::pools::{connect_sqlite, memory_pool, table_exists};
use calendar_migrate::source::create_foreign_tables;
use calendar_migrate::{
    AdvanceHints, Config, ContextOptions, MappingStore, MemoryStateBackend, MemoryTargetWriter,
    MigrateError, MigrationContext, MigrationStatus, Orchestrator, RecordType, ReportedPhase,
    SnapshotStatus, SourceReader, SqliteMappingStore, SqliteSourceReader, StateBackend,
    TargetWriter,
};
use sqlx::sqlite::SqlitePool;
use tokio_util::sync::CancellationToken;

const JOB: &str = "integration";

/// Foreign database, memory writer and memory state shared across
/// orchestrator instances, as separate invocations would share them.
struct Fixture {
    pool: SqlitePool,
    writer: Arc<MemoryTargetWriter>,
    state: Arc<MemoryStateBackend>,
}

impl Fixture {
    async fn new() -> Self {
        let pool = memory_pool().await.unwrap();
        create_foreign_tables(&pool, "legacy_").await.unwrap();
        Self {
            pool,
            writer: Arc::new(MemoryTargetWriter::new()),
            state: Arc::new(MemoryStateBackend::new()),
        }
    }

    async fn exec(&self, sql: &str) {
        sqlx::query(sql).execute(&self.pool).await.unwrap();
    }

    /// A fresh orchestrator over the shared stores.
    async fn orchestrator(&self) -> Orchestrator {
        let mapping = SqliteMappingStore::new(self.pool.clone(), "_map_").unwrap();
        self.orchestrator_with(Arc::new(mapping)).await
    }

    async fn orchestrator_with(&self, mapping: Arc<dyn MappingStore>) -> Orchestrator {
        let state: Arc<dyn StateBackend> = self.state.clone();
        let ctx = MigrationContext::load(JOB, state, ContextOptions::default())
            .await
            .unwrap();

        if !ctx.status().is_complete() {
            mapping.init_schema().await.unwrap();
        }
        let reader: Arc<dyn SourceReader> =
            Arc::new(SqliteSourceReader::new(self.pool.clone(), "legacy_", "_map_", vec![]).unwrap());
        let writer: Arc<dyn TargetWriter> = self.writer.clone();
        Orchestrator::new(reader, mapping, writer, ctx)
    }

    fn tracked_mapping(&self) -> Arc<TrackedMapping> {
        Arc::new(TrackedMapping {
            inner: SqliteMappingStore::new(self.pool.clone(), "_map_").unwrap(),
            fail_next_record: AtomicBool::new(false),
            count_calls: AtomicUsize::new(0),
        })
    }

    async fn mapping_table_count(&self) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE '\\_map\\_%' ESCAPE '\\'",
        )
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }
}

/// Mapping store that can fail its next `record` call and counts `count`
/// calls.
struct TrackedMapping {
    inner: SqliteMappingStore,
    fail_next_record: AtomicBool,
    count_calls: AtomicUsize,
}

#[async_trait]
impl MappingStore for TrackedMapping {
    async fn init_schema(&self) -> calendar_migrate::Result<()> {
        self.inner.init_schema().await
    }

    async fn record(
        &self,
        record_type: RecordType,
        foreign_id: i64,
        outcome: MappingOutcome,
    ) -> calendar_migrate::Result<()> {
        if self.fail_next_record.swap(false, Ordering::SeqCst) {
            return Err(MigrateError::pool("mapping unavailable", "recording mapping"));
        }
        self.inner.record(record_type, foreign_id, outcome).await
    }

    async fn lookup(
        &self,
        record_type: RecordType,
        foreign_id: i64,
    ) -> calendar_migrate::Result<Option<MigrationRecord>> {
        self.inner.lookup(record_type, foreign_id).await
    }

    async fn count(&self, record_type: RecordType) -> calendar_migrate::Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count(record_type).await
    }

    async fn drop_all(&self) -> calendar_migrate::Result<()> {
        self.inner.drop_all().await
    }
}

async fn seed_three_events(f: &Fixture) {
    f.exec(
        "INSERT INTO legacy_events (event_id, title, start_date, end_date) VALUES
         (1, 'Opening night', '2024-03-01 19:00:00', '2024-03-01 22:00:00'),
         (2, 'Workshop', '2024-03-02 10:00:00', '2024-03-02 12:00:00'),
         (3, 'Closing party', '2024-03-03 20:00:00', '2024-03-03 23:00:00')",
    )
    .await;
}

#[tokio::test]
async fn test_small_job_completes_in_two_calls() {
    let f = Fixture::new().await;
    seed_three_events(&f).await;
    f.exec(
        "INSERT INTO legacy_tickets (ticket_id, event_id, name, price, capacity)
         VALUES (1, 2, 'Workshop seat', 25.0, -1)",
    )
    .await;

    let mut orchestrator = f.orchestrator().await;
    let hints = AdvanceHints::default();

    let first = orchestrator.advance(&hints).await.unwrap();
    assert_eq!(first.phase, ReportedPhase::Events);
    assert_eq!(first.processed_this_batch, 3);
    assert_eq!(first.status, SnapshotStatus::InProgress);
    assert_eq!(first.totals[&RecordType::Event], 3);
    assert_eq!(first.totals[&RecordType::Ticket], 1);

    let second = orchestrator.advance(&hints).await.unwrap();
    assert_eq!(second.phase, ReportedPhase::Complete);
    assert_eq!(second.processed_this_batch, 1);
    assert_eq!(second.status, SnapshotStatus::Complete);
    assert!(second.completed_at.is_some());
    assert!(second.error_summary.is_empty());

    let events = f.writer.events().await;
    assert_eq!(events.len(), 3);
    let workshop = events
        .iter()
        .find(|(_, e)| e.input.title == "Workshop")
        .unwrap();
    assert_eq!(workshop.1.ticket_definition, Some((25.0, 9999)));
    assert_eq!(f.writer.calendar_count().await, 1);
}

#[tokio::test]
async fn test_batches_resume_across_invocations() {
    let f = Fixture::new().await;
    for id in 1..=5 {
        f.exec(&format!(
            "INSERT INTO legacy_events (event_id, title, start_date) VALUES ({id}, 'E{id}', '2024-05-0{id} 09:00:00')"
        ))
        .await;
    }
    let hints = AdvanceHints {
        batch_size: Some(2),
        ..Default::default()
    };

    // Each advance runs in a fresh orchestrator, as separate requests would.
    let mut processed = Vec::new();
    loop {
        let mut orchestrator = f.orchestrator().await;
        let snapshot = orchestrator.advance(&hints).await.unwrap();
        processed.push(snapshot.processed_this_batch);
        if snapshot.is_complete() {
            break;
        }
    }

    assert_eq!(processed, vec![2, 2, 1]);
    assert_eq!(f.writer.events().await.len(), 5);
}

#[tokio::test]
async fn test_storage_failure_is_retried_without_duplicates() {
    let f = Fixture::new().await;
    seed_three_events(&f).await;
    let mut orchestrator = f.orchestrator().await;
    let hints = AdvanceHints::default();

    f.writer.set_storage_down(true).await;
    let err = orchestrator.advance(&hints).await.unwrap_err();
    assert!(matches!(err, MigrateError::Pool { .. }));
    assert!(f.writer.events().await.is_empty());

    f.writer.set_storage_down(false).await;
    let snapshot = orchestrator.advance(&hints).await.unwrap();
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.processed_this_batch, 3);
    assert_eq!(f.writer.events().await.len(), 3);
    assert!(snapshot.error_summary.is_empty());
}

#[tokio::test]
async fn test_failed_mapping_write_does_not_duplicate_native_rows() {
    let f = Fixture::new().await;
    f.exec("INSERT INTO legacy_events (event_id, title, start_date) VALUES (1, 'Gala', '2024-09-01 18:00:00')")
        .await;
    let mapping = f.tracked_mapping();
    let mut orchestrator = f.orchestrator_with(mapping.clone()).await;

    // The native event is written, then recording its mapping fails.
    mapping.fail_next_record.store(true, Ordering::SeqCst);
    let err = orchestrator.advance(&AdvanceHints::default()).await.unwrap_err();
    assert!(matches!(err, MigrateError::Pool { .. }));
    assert_eq!(f.writer.events().await.len(), 1);

    let snapshot = orchestrator.advance(&AdvanceHints::default()).await.unwrap();
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.batch.migrated, 1);
    assert_eq!(f.writer.events().await.len(), 1);
}

#[tokio::test]
async fn test_failed_skip_write_logs_the_error_once() {
    let f = Fixture::new().await;
    f.exec("INSERT INTO legacy_events (event_id, title, start_date) VALUES (1, 'Refused', '2024-09-01 18:00:00')")
        .await;
    f.writer.reject_title("Refused").await;
    let mapping = f.tracked_mapping();
    let mut orchestrator = f.orchestrator_with(mapping.clone()).await;

    // The rejection is logged, then recording the skip fails.
    mapping.fail_next_record.store(true, Ordering::SeqCst);
    assert!(orchestrator.advance(&AdvanceHints::default()).await.is_err());

    let snapshot = orchestrator.advance(&AdvanceHints::default()).await.unwrap();
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.error_summary.len(), 1);
    assert_eq!(snapshot.error_summary[0].errors.len(), 1);
    assert_eq!(snapshot.error_summary[0].errors[0].id, 1);
}

#[tokio::test]
async fn test_supplied_totals_skip_counting() {
    let f = Fixture::new().await;
    seed_three_events(&f).await;
    f.exec("INSERT INTO legacy_tickets (ticket_id, event_id, price, capacity) VALUES (1, 1, 10.0, 5)")
        .await;

    let mapping = f.tracked_mapping();
    let mut orchestrator = f.orchestrator_with(mapping.clone()).await;
    let hints = AdvanceHints {
        totals: Some(BTreeMap::from([(RecordType::Event, 42), (RecordType::Ticket, 7)])),
        batch_size: Some(1),
    };
    let snapshot = orchestrator.advance(&hints).await.unwrap();
    assert_eq!(snapshot.totals[&RecordType::Event], 42);
    assert_eq!(snapshot.totals[&RecordType::Ticket], 7);
    assert_eq!(snapshot.processed_this_batch, 1);
    assert_eq!(mapping.count_calls.load(Ordering::SeqCst), 0);

    // Without hints, a fresh invocation counts each type once.
    let mapping = f.tracked_mapping();
    let mut counted = f.orchestrator_with(mapping.clone()).await;
    let snapshot = counted.advance(&AdvanceHints::default()).await.unwrap();
    assert_eq!(snapshot.totals[&RecordType::Event], 3);
    assert_eq!(snapshot.totals[&RecordType::Ticket], 1);
    assert_eq!(mapping.count_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_rejections_reported_on_completion() {
    let f = Fixture::new().await;
    seed_three_events(&f).await;
    f.exec(
        "INSERT INTO legacy_orders (order_id, event_id, status, total, email, first_name, last_name, order_date) VALUES
         (10, 1, 'completed', 50.0, 'ann@example.com', 'Ann', 'Lee', '2024-02-01 12:00:00'),
         (11, 1, 'pending', 20.0, 'blocked@example.com', 'Bob', 'Ray', '2024-02-02 12:00:00')",
    )
    .await;
    f.exec(
        "INSERT INTO legacy_order_items (item_id, order_id, email, first_name, last_name) VALUES
         (100, 10, 'ann@example.com', 'Ann', 'Lee'),
         (101, 11, 'blocked@example.com', 'Bob', 'Ray')",
    )
    .await;
    f.writer.reject_title("Closing party").await;
    f.writer.reject_email("blocked@example.com").await;

    let mut orchestrator = f.orchestrator().await;
    let snapshot = orchestrator
        .run_to_completion(&AdvanceHints::default(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert!(snapshot.is_complete());
    assert_eq!(snapshot.error_summary.len(), 2);

    let events = &snapshot.error_summary[0];
    assert_eq!(events.record_type, RecordType::Event);
    assert_eq!(events.errors.len(), 1);
    assert_eq!(events.errors[0].id, 3);
    assert_eq!(events.errors[0].name, "Closing party");

    // Item 101 belongs to the rejected order: a structural skip, not an error.
    let orders = &snapshot.error_summary[1];
    assert_eq!(orders.record_type, RecordType::Order);
    assert_eq!(orders.errors[0].id, 11);
    assert_eq!(orders.errors[0].name, "Bob Ray");

    let rendered = snapshot.render_errors();
    assert!(rendered.contains("Event #3: Closing party"));
    assert!(rendered.contains("Order #11: Bob Ray"));
    assert!(!rendered.contains("Attendee"));

    assert_eq!(f.writer.orders().await.len(), 1);
    assert_eq!(f.writer.tickets().await.len(), 1);
    let paid = &f.writer.orders().await[0].1;
    assert_eq!(paid.status, "paid");
    assert!(paid.paid_at.is_some());
}

#[tokio::test]
async fn test_ticket_definitions_skip_structurally() {
    let f = Fixture::new().await;
    f.exec(
        "INSERT INTO legacy_events (event_id, title, start_date) VALUES
         (1, 'Concert', '2024-06-01 20:00:00'),
         (2, 'Rejected', '2024-06-02 20:00:00')",
    )
    .await;
    f.exec(
        "INSERT INTO legacy_tickets (ticket_id, event_id, name, price, capacity) VALUES
         (1, 1, 'Standard', 30.0, 100),
         (2, 1, 'VIP', 90.0, 10),
         (3, 2, 'Standard', 15.0, 50),
         (4, 99, 'Orphan', 5.0, 5)",
    )
    .await;
    f.writer.reject_title("Rejected").await;

    let mut orchestrator = f.orchestrator().await;
    let snapshot = orchestrator
        .run_to_completion(&AdvanceHints::default(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    // Only the rejected event is an error; the three ticket skips are not.
    assert_eq!(snapshot.error_summary.len(), 1);
    assert_eq!(snapshot.error_summary[0].record_type, RecordType::Event);

    let events = f.writer.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.ticket_definition, Some((30.0, 100)));
}

#[tokio::test]
async fn test_attendees_are_deduplicated() {
    let f = Fixture::new().await;
    seed_three_events(&f).await;
    f.exec(
        "INSERT INTO legacy_orders (order_id, event_id, status, email, first_name, last_name) VALUES
         (10, 1, 'completed', 'ann@example.com', 'Ann', 'Lee'),
         (11, 2, 'completed', 'ann@example.com', 'Ann', 'Lee')",
    )
    .await;
    f.exec(
        "INSERT INTO legacy_order_items (item_id, order_id, email, first_name, last_name) VALUES
         (100, 10, 'ann@example.com', 'Ann', 'Lee'),
         (101, 11, 'ann@example.com', 'Ann', 'Lee'),
         (102, 11, 'ann@example.com', 'Annie', 'Lee')",
    )
    .await;

    let mut orchestrator = f.orchestrator().await;
    orchestrator
        .run_to_completion(&AdvanceHints::default(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(f.writer.attendees().await.len(), 2);
    let tickets = f.writer.tickets().await;
    assert_eq!(tickets.len(), 3);
    assert_eq!(tickets[0].1.attendee_id, tickets[1].1.attendee_id);
    assert_ne!(tickets[1].1.attendee_id, tickets[2].1.attendee_id);
    assert!(tickets.iter().all(|(_, t)| t.event_id.is_some()));
}

#[tokio::test]
async fn test_completed_job_is_left_alone() {
    let f = Fixture::new().await;
    seed_three_events(&f).await;

    let mut orchestrator = f.orchestrator().await;
    let done = orchestrator.advance(&AdvanceHints::default()).await.unwrap();
    assert!(done.is_complete());
    assert_eq!(f.mapping_table_count().await, 0);

    // Same instance: the completion snapshot again, nothing new written.
    let again = orchestrator.advance(&AdvanceHints::default()).await.unwrap();
    assert!(again.is_complete());
    assert_eq!(again.processed_this_batch, 0);
    assert_eq!(again.completed_at, done.completed_at);

    // New rows after completion are not picked up by a later invocation.
    f.exec("INSERT INTO legacy_events (event_id, title, start_date) VALUES (4, 'Late', '2024-04-01 09:00:00')")
        .await;
    let mut later = f.orchestrator().await;
    let snapshot = later.advance(&AdvanceHints::default()).await.unwrap();
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.processed_this_batch, 0);
    assert_eq!(snapshot.completed_at, done.completed_at);
    assert!(snapshot.totals.is_empty());
    assert_eq!(f.mapping_table_count().await, 0);
    assert_eq!(f.writer.events().await.len(), 3);
}

#[tokio::test]
async fn test_cancelled_run_stops_before_next_batch() {
    let f = Fixture::new().await;
    seed_three_events(&f).await;
    let mut orchestrator = f.orchestrator().await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = orchestrator
        .run_to_completion(&AdvanceHints::default(), &cancel, |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::Cancelled));
    assert!(f.writer.events().await.is_empty());
}

#[tokio::test]
async fn test_status_report_counts_remaining_work() {
    let f = Fixture::new().await;
    seed_three_events(&f).await;
    f.exec("INSERT INTO legacy_tickets (ticket_id, event_id, price, capacity) VALUES (1, 1, 10.0, 5)")
        .await;

    let mut orchestrator = f.orchestrator().await;
    let report = orchestrator.status_report().await.unwrap();
    assert_eq!(report.remaining.events, 3);
    assert_eq!(report.remaining.tickets, 1);
    assert_eq!(report.pending_errors, 0);

    orchestrator.advance(&AdvanceHints::default()).await.unwrap();
    let report = orchestrator.status_report().await.unwrap();
    assert_eq!(report.remaining.events, 0);
    assert_eq!(report.remaining.tickets, 1);
}

/// Foreign database file holding `events` events with consecutive ids.
async fn seed_event_file(path: &Path, events: i64) {
    let seed = connect_sqlite(&format!("sqlite://{}", path.display()), 1, true, "seed")
        .await
        .unwrap();
    create_foreign_tables(&seed, "legacy_").await.unwrap();
    for id in 1..=events {
        sqlx::query(&format!(
            "INSERT INTO legacy_events (event_id, title, start_date) VALUES ({id}, 'E{id}', '2024-05-0{id} 09:00:00')"
        ))
        .execute(&seed)
        .await
        .unwrap();
    }
    seed.close().await;
}

fn file_config(source: &Path, target: &Path, job_id: &str) -> Config {
    let yaml = format!(
        "source:\n  url: \"sqlite://{}\"\ntarget:\n  url: \"sqlite://{}\"\nmigration:\n  job_id: {}\n",
        source.display(),
        target.display(),
        job_id
    );
    Config::from_yaml(&yaml).unwrap()
}

async fn table_count(path: &Path, table: &str) -> i64 {
    let pool = connect_sqlite(&format!("sqlite://{}", path.display()), 1, false, "check")
        .await
        .unwrap();
    let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    count
}

async fn has_table(path: &Path, table: &str) -> bool {
    let pool = connect_sqlite(&format!("sqlite://{}", path.display()), 1, false, "check")
        .await
        .unwrap();
    let exists = table_exists(&pool, table).await.unwrap();
    pool.close().await;
    exists
}

#[tokio::test]
async fn test_completed_job_from_config_is_not_repeated() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    let target = dir.path().join("native.db");
    seed_event_file(&source, 2).await;
    let config = file_config(&source, &target, "twice");

    for _ in 0..2 {
        let mut orchestrator = Orchestrator::from_config(&config).await.unwrap();
        let snapshot = orchestrator
            .run_to_completion(&AdvanceHints::default(), &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert!(snapshot.is_complete());
    }

    assert_eq!(table_count(&target, "events").await, 2);
    assert!(!has_table(&source, "_calmig_map_events").await);
}

#[tokio::test]
async fn test_read_only_open_creates_no_tables() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    let target = dir.path().join("native.db");
    seed_event_file(&source, 2).await;
    let config = file_config(&source, &target, "peek");

    let mut orchestrator = Orchestrator::open_read_only(&config).await.unwrap();
    let report = orchestrator.status_report().await.unwrap();
    assert_eq!(report.status, MigrationStatus::NotStarted);
    assert_eq!(report.remaining.events, 2);
    assert_eq!(report.pending_errors, 0);
    assert!(orchestrator.health_check().await.unwrap().healthy);
    assert!(matches!(
        orchestrator.advance(&AdvanceHints::default()).await,
        Err(MigrateError::State(_))
    ));
    drop(orchestrator);

    assert!(!has_table(&target, "events").await);
    assert!(!has_table(&target, "_calmig_job_status").await);
    assert!(!has_table(&source, "_calmig_map_events").await);

    // Once a batch has run, the read-only view reports the live job.
    let mut writer = Orchestrator::from_config(&config).await.unwrap();
    let hints = AdvanceHints {
        batch_size: Some(1),
        ..Default::default()
    };
    writer.advance(&hints).await.unwrap();
    drop(writer);

    let mut orchestrator = Orchestrator::open_read_only(&config).await.unwrap();
    let report = orchestrator.status_report().await.unwrap();
    assert_eq!(report.status, MigrationStatus::InProgress);
    assert_eq!(report.remaining.events, 1);
}

#[tokio::test]
async fn test_from_config_runs_against_sqlite_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    let target = dir.path().join("native.db");

    let seed = connect_sqlite(&format!("sqlite://{}", source.display()), 1, true, "seed")
        .await
        .unwrap();
    create_foreign_tables(&seed, "legacy_").await.unwrap();
    sqlx::query(
        "INSERT INTO legacy_events (event_id, title, start_date, end_date, location_id) VALUES
         (1, 'Gala', '2024-09-01 18:00:00', '2024-09-01 23:00:00', 7)",
    )
    .execute(&seed)
    .await
    .unwrap();
    sqlx::query("INSERT INTO legacy_locations (location_id, name, city) VALUES (7, 'Town Hall', 'Leeds')")
        .execute(&seed)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO legacy_orders (order_id, event_id, status, total, email, first_name, last_name)
         VALUES (5, 1, 'completed', 40.0, 'cy@example.com', 'Cy', 'Hart')",
    )
    .execute(&seed)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO legacy_order_items (item_id, order_id, email, first_name, last_name)
         VALUES (50, 5, 'cy@example.com', 'Cy', 'Hart')",
    )
    .execute(&seed)
    .await
    .unwrap();
    seed.close().await;

    let yaml = format!(
        "source:\n  url: \"sqlite://{}\"\ntarget:\n  url: \"sqlite://{}\"\nmigration:\n  job_id: files\n",
        source.display(),
        target.display()
    );
    let config = Config::from_yaml(&yaml).unwrap();

    let mut orchestrator = Orchestrator::from_config(&config).await.unwrap();
    let snapshot = orchestrator
        .run_to_completion(&AdvanceHints::default(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();
    assert!(snapshot.is_complete());
    assert!(snapshot.error_summary.is_empty());
    drop(orchestrator);

    let native = connect_sqlite(&format!("sqlite://{}", target.display()), 1, false, "check")
        .await
        .unwrap();
    for (table, expected) in [("events", 1), ("orders", 1), ("attendees", 1), ("tickets", 1)] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&native)
            .await
            .unwrap();
        assert_eq!(count, expected, "{}", table);
    }
    let location: Option<String> = sqlx::query_scalar("SELECT location FROM events")
        .fetch_one(&native)
        .await
        .unwrap();
    assert!(location.unwrap().contains("Town Hall"));

    // Status survives the process; a new orchestrator sees the job complete.
    let mut resumed = Orchestrator::from_config(&config).await.unwrap();
    let report = resumed.status_report().await.unwrap();
    assert!(report.status.is_complete());
}
