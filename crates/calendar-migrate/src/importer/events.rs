//! Events phase.

use tracing::debug;

use super::{BatchOutcome, PhaseIo};
use crate::core::{ForeignEvent, NativeEventInput, RecordType};
use crate::error::Result;
use crate::orchestrator::MigrationContext;
use crate::recurrence::{translate, ForeignRecurrence};

pub async fn import(
    io: &PhaseIo<'_>,
    ctx: &mut MigrationContext,
    events: Vec<ForeignEvent>,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    if events.is_empty() {
        return Ok(outcome);
    }

    let calendar_id = match ctx.calendar_id() {
        Some(id) => id,
        None => {
            let id = io
                .writer
                .ensure_calendar(&ctx.options().default_calendar)
                .await?;
            ctx.set_calendar_id(id);
            id
        }
    };

    for event in events {
        outcome.processed += 1;

        let created = match to_native(&event, calendar_id) {
            Some(input) => io.writer.create_event(&input).await?,
            None => None,
        };

        match created {
            Some(created) => {
                io.migrated(&mut outcome, RecordType::Event, event.id, created.event_id)
                    .await?
            }
            None => {
                io.failed(ctx, &mut outcome, RecordType::Event, event.id, display_name(&event))
                    .await?
            }
        }
    }
    Ok(outcome)
}

/// Build the native input. `None` when the event has no usable start date.
pub fn to_native(event: &ForeignEvent, calendar_id: i64) -> Option<NativeEventInput> {
    let start = event.start?;

    let recurrence = match &event.recurrence {
        Some(ForeignRecurrence::Unsupported { kind }) => {
            debug!(
                "Event {} repeats as '{}', importing as a single occurrence",
                event.id, kind
            );
            None
        }
        Some(rule) => translate(rule),
        None => None,
    };

    let location = event
        .venue
        .as_ref()
        .map(|v| v.formatted())
        .filter(|l| !l.is_empty());

    Some(NativeEventInput {
        legacy_id: event.id,
        calendar_id,
        title: event.title.clone(),
        content: event.content.clone(),
        status: event.status.clone(),
        start,
        end: event.end.unwrap_or(start),
        timezone: event.timezone.clone(),
        all_day: event.all_day,
        url: event.url.clone(),
        location,
        recurrence,
        meta: event.custom_fields.clone(),
    })
}

fn display_name(event: &ForeignEvent) -> String {
    if event.title.trim().is_empty() {
        format!("Untitled event {}", event.id)
    } else {
        event.title.clone()
    }
}
