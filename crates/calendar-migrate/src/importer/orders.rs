//! Orders phase.

use chrono::{NaiveDateTime, Utc};

use super::{BatchOutcome, PhaseIo};
use crate::core::{ForeignOrder, NativeOrderInput, RecordType};
use crate::error::Result;
use crate::orchestrator::MigrationContext;

pub async fn import(
    io: &PhaseIo<'_>,
    ctx: &mut MigrationContext,
    orders: Vec<ForeignOrder>,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();

    for order in orders {
        outcome.processed += 1;

        let event_id = match order.event_id {
            Some(id) => io.mapping.resolve(RecordType::Event, id).await?,
            None => None,
        };

        let input = to_native(&order, event_id, Utc::now().naive_utc());
        match io.writer.create_order(&input).await? {
            Some(native_id) => {
                io.migrated(&mut outcome, RecordType::Order, order.id, native_id)
                    .await?
            }
            None => {
                io.failed(ctx, &mut outcome, RecordType::Order, order.id, order.display_name())
                    .await?
            }
        }
    }
    Ok(outcome)
}

/// `completed` becomes `paid`; other statuses pass through.
pub fn map_status(status: &str) -> String {
    match status {
        "completed" => "paid".to_string(),
        other => other.to_string(),
    }
}

/// Build the native order. Paid orders always carry a payment date: the
/// order date, or `now` when the order has none.
pub fn to_native(
    order: &ForeignOrder,
    event_id: Option<i64>,
    now: NaiveDateTime,
) -> NativeOrderInput {
    let status = map_status(&order.status);
    let paid_at = (status == "paid").then(|| order.ordered_at.unwrap_or(now));

    NativeOrderInput {
        legacy_id: order.id,
        event_id,
        status,
        subtotal: order.subtotal,
        tax: order.tax,
        total: order.total,
        currency: order.currency.clone(),
        email: order.email.clone(),
        first_name: order.first_name.clone(),
        last_name: order.last_name.clone(),
        created_at: order.ordered_at,
        paid_at,
    }
}
