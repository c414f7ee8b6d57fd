use sea_orm::ConnectionTrait;

use crate::{
    error::{AppError, GuardReason, Result},
    infrastructure::db::{
        entities::order::{self, OrderStatus, PrinterSendStatus},
        repositories::OrderRepository,
    },
    services::orders::types::Trigger,
};

fn ensure(condition: bool, reason: GuardReason) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(AppError::GuardFailed(reason))
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|text| !text.trim().is_empty())
}

/// Whether the print house holds, or may be about to hold, the order.
pub fn printer_involved(order: &order::Model, status: OrderStatus) -> bool {
    order.printer_send_status == PrinterSendStatus::Sending
        || order.printer_send_status.is_acknowledged()
        || (status.is_in_production() && !order.skipped_production)
}

/// Extra photos a customer still has to pay for before confirming.
pub fn extra_payment_outstanding(order: &order::Model) -> bool {
    order.franchisee_id.is_none() && order.selection_extra_cents > 0 && !order.selection_extra_paid
}

/// Checks the preconditions of `from -> to` against the order as it would be written.
pub async fn check<C: ConnectionTrait>(
    db_connection: &C,
    candidate: &order::Model,
    from: OrderStatus,
    to: OrderStatus,
    trigger: Trigger,
) -> Result<()> {
    use OrderStatus::*;

    match (from, to) {
        (Unpaid, Paid) => ensure(
            has_text(&candidate.transaction_id),
            GuardReason::TransactionIdMissing,
        ),
        (Shooting, Retouching) => ensure(
            candidate.shooting_completed_at.is_some(),
            GuardReason::ShootingNotCompleted,
        ),
        (Retouching, AiProcessing) => ensure(
            has_text(&candidate.final_image),
            GuardReason::FinalImageMissing,
        ),
        (AiProcessing, PendingSelection) => {
            ensure(has_text(&candidate.hd_image), GuardReason::HdImageMissing)
        }
        (AiProcessing, Retouching) => ensure(
            trigger == Trigger::AiExhausted,
            GuardReason::TriggerNotAllowed,
        ),
        (PendingSelection, SelectionCompleted) => {
            let picks = OrderRepository::count_selected(db_connection, candidate.id).await?;
            ensure(picks > 0, GuardReason::NoPicks)?;
            ensure(
                !extra_payment_outstanding(candidate),
                GuardReason::ExtraPaymentPending,
            )
        }
        (SelectionCompleted, Printing) => ensure(
            candidate.printer_send_status.is_acknowledged() || candidate.skipped_production,
            GuardReason::PrinterNotAcknowledged,
        ),
        (PendingShipment, Shipped) => ensure(
            candidate.tracking_number().is_some(),
            GuardReason::TrackingNumberMissing,
        ),
        (_, Cancelled) => ensure(
            !printer_involved(candidate, from) || trigger == Trigger::PrinterCancelAck,
            GuardReason::CancelAwaitingPrinter,
        ),
        _ => Ok(()),
    }
}
