//! In-process native writer.
//!
//! Keeps created records in memory and exposes them for inspection. Items can
//! be rejected by title or email, and storage failures can be switched on to
//! exercise the retry path.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{check_attendee, check_event, check_order, check_ticket};
use crate::core::{
    AttendeeIdentity, CreatedEvent, NativeEventInput, NativeOrderInput, NativeTicketInput,
    TargetWriter,
};
use crate::error::{MigrateError, Result};

/// A created event with its ticket definition, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub post_id: i64,
    pub input: NativeEventInput,
    /// `(price, capacity)`.
    pub ticket_definition: Option<(f64, i64)>,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    calendars: BTreeMap<String, i64>,
    events: BTreeMap<i64, StoredEvent>,
    orders: BTreeMap<i64, NativeOrderInput>,
    attendees: BTreeMap<i64, AttendeeIdentity>,
    tickets: BTreeMap<i64, NativeTicketInput>,
    rejected_titles: HashSet<String>,
    rejected_emails: HashSet<String>,
    storage_down: bool,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_storage(&self) -> Result<()> {
        if self.storage_down {
            return Err(MigrateError::pool("storage unavailable", "memory target"));
        }
        Ok(())
    }
}

/// Target writer holding everything in memory.
#[derive(Debug, Default)]
pub struct MemoryTargetWriter {
    store: Mutex<Store>,
}

impl MemoryTargetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every event with this title.
    pub async fn reject_title(&self, title: &str) {
        self.store.lock().await.rejected_titles.insert(title.to_string());
    }

    /// Reject every order and attendee with this email.
    pub async fn reject_email(&self, email: &str) {
        self.store.lock().await.rejected_emails.insert(email.to_string());
    }

    /// While set, every call fails with a storage error.
    pub async fn set_storage_down(&self, down: bool) {
        self.store.lock().await.storage_down = down;
    }

    pub async fn events(&self) -> Vec<(i64, StoredEvent)> {
        let store = self.store.lock().await;
        store.events.iter().map(|(id, e)| (*id, e.clone())).collect()
    }

    pub async fn orders(&self) -> Vec<(i64, NativeOrderInput)> {
        let store = self.store.lock().await;
        store.orders.iter().map(|(id, o)| (*id, o.clone())).collect()
    }

    pub async fn attendees(&self) -> Vec<(i64, AttendeeIdentity)> {
        let store = self.store.lock().await;
        store.attendees.iter().map(|(id, a)| (*id, a.clone())).collect()
    }

    pub async fn tickets(&self) -> Vec<(i64, NativeTicketInput)> {
        let store = self.store.lock().await;
        store.tickets.iter().map(|(id, t)| (*id, *t)).collect()
    }

    pub async fn calendar_count(&self) -> usize {
        self.store.lock().await.calendars.len()
    }
}

#[async_trait]
impl TargetWriter for MemoryTargetWriter {
    async fn ensure_calendar(&self, name: &str) -> Result<i64> {
        let mut store = self.store.lock().await;
        store.check_storage()?;
        if let Some(id) = store.calendars.get(name) {
            return Ok(*id);
        }
        let id = store.next_id();
        store.calendars.insert(name.to_string(), id);
        Ok(id)
    }

    async fn create_event(&self, input: &NativeEventInput) -> Result<Option<CreatedEvent>> {
        let mut store = self.store.lock().await;
        store.check_storage()?;
        if let Some((event_id, event)) = store
            .events
            .iter()
            .find(|(_, e)| e.input.legacy_id == input.legacy_id)
        {
            return Ok(Some(CreatedEvent {
                event_id: *event_id,
                post_id: event.post_id,
            }));
        }
        if check_event(input).is_some() || store.rejected_titles.contains(&input.title) {
            return Ok(None);
        }
        let post_id = store.next_id();
        let event_id = store.next_id();
        store.events.insert(
            event_id,
            StoredEvent {
                post_id,
                input: input.clone(),
                ticket_definition: None,
            },
        );
        Ok(Some(CreatedEvent { event_id, post_id }))
    }

    async fn has_ticket_definition(&self, event_id: i64) -> Result<bool> {
        let store = self.store.lock().await;
        store.check_storage()?;
        Ok(store
            .events
            .get(&event_id)
            .is_some_and(|e| e.ticket_definition.is_some()))
    }

    async fn attach_ticket_definition(
        &self,
        event_id: i64,
        price: f64,
        capacity: i64,
    ) -> Result<bool> {
        let mut store = self.store.lock().await;
        store.check_storage()?;
        match store.events.get_mut(&event_id) {
            Some(event) if event.ticket_definition.is_none() => {
                event.ticket_definition = Some((price, capacity));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_order(&self, input: &NativeOrderInput) -> Result<Option<i64>> {
        let mut store = self.store.lock().await;
        store.check_storage()?;
        if let Some((id, _)) = store.orders.iter().find(|(_, o)| o.legacy_id == input.legacy_id) {
            return Ok(Some(*id));
        }
        if check_order(input).is_some() || store.rejected_emails.contains(&input.email) {
            return Ok(None);
        }
        let id = store.next_id();
        store.orders.insert(id, input.clone());
        Ok(Some(id))
    }

    async fn order_event_id(&self, order_id: i64) -> Result<Option<i64>> {
        let store = self.store.lock().await;
        store.check_storage()?;
        Ok(store
            .orders
            .get(&order_id)
            .and_then(|o| o.event_id)
            .filter(|id| *id > 0))
    }

    async fn create_or_get_attendee(&self, identity: &AttendeeIdentity) -> Result<Option<i64>> {
        let mut store = self.store.lock().await;
        store.check_storage()?;
        if check_attendee(identity).is_some() || store.rejected_emails.contains(&identity.email) {
            return Ok(None);
        }
        if let Some((id, _)) = store.attendees.iter().find(|(_, a)| *a == identity) {
            return Ok(Some(*id));
        }
        let id = store.next_id();
        store.attendees.insert(id, identity.clone());
        Ok(Some(id))
    }

    async fn create_ticket(&self, input: &NativeTicketInput) -> Result<Option<i64>> {
        let mut store = self.store.lock().await;
        store.check_storage()?;
        if let Some((id, _)) = store.tickets.iter().find(|(_, t)| t.legacy_id == input.legacy_id) {
            return Ok(Some(*id));
        }
        if check_ticket(input).is_some() {
            return Ok(None);
        }
        let id = store.next_id();
        store.tickets.insert(id, *input);
        Ok(Some(id))
    }

    async fn test_connection(&self) -> Result<()> {
        self.store.lock().await.check_storage()
    }

    fn writer_type(&self) -> &'static str {
        "memory"
    }
}
