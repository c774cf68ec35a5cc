//! Attendees phase: each foreign ticket purchase becomes a native ticket
//! linking order, event and a de-duplicated attendee.

use super::{BatchOutcome, PhaseIo};
use crate::core::{ForeignAttendee, NativeTicketInput, RecordType};
use crate::error::Result;
use crate::orchestrator::MigrationContext;

pub async fn import(
    io: &PhaseIo<'_>,
    ctx: &mut MigrationContext,
    attendees: Vec<ForeignAttendee>,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();

    for attendee in attendees {
        outcome.processed += 1;

        let Some(order_id) = io.mapping.resolve(RecordType::Order, attendee.order_id).await? else {
            io.skipped(&mut outcome, RecordType::Attendee, attendee.id, "order not migrated")
                .await?;
            continue;
        };

        let ticket_id = match io.writer.create_or_get_attendee(&attendee.identity()).await? {
            Some(attendee_id) => {
                let input = NativeTicketInput {
                    legacy_id: attendee.id,
                    order_id,
                    event_id: io.writer.order_event_id(order_id).await?,
                    attendee_id,
                };
                io.writer.create_ticket(&input).await?
            }
            None => None,
        };

        match ticket_id {
            Some(ticket_id) => {
                io.migrated(&mut outcome, RecordType::Attendee, attendee.id, ticket_id)
                    .await?
            }
            None => {
                io.failed(
                    ctx,
                    &mut outcome,
                    RecordType::Attendee,
                    attendee.id,
                    attendee.display_name(),
                )
                .await?
            }
        }
    }
    Ok(outcome)
}
