//! Tickets phase: foreign ticket definitions become the price and capacity
//! of the native event they belong to.

use super::{BatchOutcome, PhaseIo};
use crate::core::{ForeignTicket, RecordType};
use crate::error::Result;
use crate::orchestrator::MigrationContext;

pub async fn import(
    io: &PhaseIo<'_>,
    ctx: &mut MigrationContext,
    tickets: Vec<ForeignTicket>,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();

    for ticket in tickets {
        outcome.processed += 1;

        let Some(event_id) = io.mapping.resolve(RecordType::Event, ticket.event_id).await? else {
            io.skipped(&mut outcome, RecordType::Ticket, ticket.id, "event not migrated")
                .await?;
            continue;
        };

        // One definition per native event; later foreign tickets for the
        // same event are dropped.
        if io.writer.has_ticket_definition(event_id).await? {
            io.skipped(
                &mut outcome,
                RecordType::Ticket,
                ticket.id,
                "event already has a ticket definition",
            )
            .await?;
            continue;
        }

        let capacity = clamp_capacity(ticket.capacity, ctx.options().unlimited_capacity);
        if io
            .writer
            .attach_ticket_definition(event_id, ticket.price, capacity)
            .await?
        {
            io.migrated(&mut outcome, RecordType::Ticket, ticket.id, event_id)
                .await?;
        } else {
            io.failed(ctx, &mut outcome, RecordType::Ticket, ticket.id, ticket.name.clone())
                .await?;
        }
    }
    Ok(outcome)
}

/// `-1` means unlimited; other negative capacities become zero.
pub fn clamp_capacity(capacity: i64, unlimited: i64) -> i64 {
    match capacity {
        -1 => unlimited,
        c if c < 0 => 0,
        c => c,
    }
}
