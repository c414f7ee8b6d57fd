pub mod client;
pub mod payload;
pub mod settings;
pub mod types;

use sea_orm::ActiveValue::Set;
use serde_json::json;

use crate::{
    AppState,
    error::{AppError, GuardReason, Result},
    infrastructure::db::{
        entities::order::{self, OrderStatus, PrinterSendStatus},
        repositories::{
            CatalogRepository, FranchiseeRepository, OrderRepository, PrinterDispatchRepository,
        },
    },
    services::{
        events::DomainEvent,
        orders::{self, CancelOutcome, SYSTEM_ACTOR, TransitionRequest, Trigger},
        printer::{
            client::VendorReply,
            settings::PrinterSettings,
            types::{CallbackAck, LogisticsCallback},
        },
    },
    utils::{backoff, security::verify_signature},
};

pub use types::{DispatchOutcome, RetryReport};

const VENDOR_ACTOR: &str = "printer";

async fn load_order(state: &AppState, order_id: i32) -> Result<order::Model> {
    OrderRepository::find_by_id(state.db.get_connection(), order_id)
        .await?
        .ok_or(AppError::OrderNotFound)
}

pub async fn dispatch(state: &AppState, order_id: i32, actor: &str) -> Result<DispatchOutcome> {
    dispatch_with(state, order_id, actor, None).await
}

/// Sends the order to the print house under its external key.
///
/// The order is marked `sending` and the attempt recorded before the call;
/// no transaction is held while the vendor answers.
pub async fn dispatch_with(
    state: &AppState,
    order_id: i32,
    actor: &str,
    expected_version: Option<i32>,
) -> Result<DispatchOutcome> {
    let settings = PrinterSettings::load(state).await?;
    let db_connection = state.db.get_connection();

    let order = load_order(state, order_id).await?;
    orders::check_version(&order, expected_version)?;

    let franchisee = match order.franchisee_id {
        Some(franchisee_id) => FranchiseeRepository::find_by_id(db_connection, franchisee_id).await?,
        None => None,
    };
    let size = match order.size.as_deref() {
        Some(size) => CatalogRepository::size_by_name(db_connection, size).await?,
        None => None,
    };
    let payload = serde_json::to_value(payload::build(
        &order,
        &settings,
        franchisee.as_ref(),
        size.as_ref(),
        state.clock.now(),
    )?)?;

    let now = state.clock.now();
    let uow = state.db.unit_of_work().await?;
    let locked = uow.order_for_update(order_id).await?;
    let record = PrinterDispatchRepository::find_or_create(uow.connection(), &locked, now).await?;

    let ready = orders::check_version(&locked, expected_version).and_then(|_| {
        let status = locked.order_status()?;
        if !matches!(
            status,
            OrderStatus::SelectionCompleted | OrderStatus::Printing
        ) {
            return Err(AppError::GuardFailed(GuardReason::DispatchNotReady));
        }

        let in_flight_until = record
            .last_attempt_at
            .map(|at| at + backoff::to_chrono(settings.request_timeout * 2));
        if locked.printer_send_status == PrinterSendStatus::Sending
            && in_flight_until.is_some_and(|until| until > now)
        {
            return Err(AppError::GuardFailed(GuardReason::PrinterDispatchPending));
        }

        Ok(())
    });
    if let Err(err) = ready {
        uow.rollback().await?;
        return Err(err);
    }

    let attempt = record.attempt_count + 1;
    let record = PrinterDispatchRepository::update(uow.connection(), record, now, |active| {
        active.attempt_count = Set(attempt);
        active.last_attempt_at = Set(Some(now));
        active.next_retry_at = Set(None);
    })
    .await?;

    let mut active: order::ActiveModel = locked.clone().into();
    active.printer_send_status = Set(PrinterSendStatus::Sending);
    OrderRepository::save(uow.connection(), &locked, active, now).await?;
    uow.commit().await?;

    tracing::info!(
        order_id,
        external_key = %record.external_key,
        attempt,
        actor,
        "Dispatching order to print house"
    );

    let (reply, response_body) = match state.printer.submit_order(&settings, &payload).await {
        Ok(response) => (response.classify(), Some(response.body)),
        Err(err) => (
            VendorReply::Rejected {
                message: err.to_string(),
            },
            None,
        ),
    };

    let finished_at = state.clock.now();
    let uow = state.db.unit_of_work().await?;
    let current = uow.order_for_update(order_id).await?;
    let record = PrinterDispatchRepository::find_by_order(uow.connection(), order_id)
        .await?
        .ok_or_else(|| {
            AppError::InternalServerError(format!("dispatch record of order {order_id} vanished"))
        })?;

    match reply {
        VendorReply::Accepted | VendorReply::Duplicate => {
            PrinterDispatchRepository::update(uow.connection(), record, finished_at, |active| {
                active.succeeded_at = Set(Some(finished_at));
                active.response_data = Set(response_body);
                active.last_error = Set(None);
                active.next_retry_at = Set(None);
            })
            .await?;

            let mut active: order::ActiveModel = current.clone().into();
            active.printer_send_status = Set(PrinterSendStatus::SentSuccess);
            active.printer_error_message = Set(None);
            let saved = OrderRepository::save(uow.connection(), &current, active, finished_at).await?;
            uow.commit().await?;

            tracing::info!(
                order_id,
                duplicate = matches!(reply, VendorReply::Duplicate),
                "Print house accepted order"
            );

            if saved.cancel_requested_at.is_some() {
                let outcome = forward_cancel(state, order_id, actor).await?;
                return Ok(DispatchOutcome::Sent(outcome.into_order()));
            }

            if saved.order_status()? == OrderStatus::SelectionCompleted {
                let request = TransitionRequest::new(
                    order_id,
                    OrderStatus::Printing,
                    Trigger::PrinterAck,
                    actor,
                );
                let printing = orders::transition(state, request).await?;
                return Ok(DispatchOutcome::Sent(printing));
            }

            Ok(DispatchOutcome::Sent(saved))
        }
        VendorReply::Rejected { message } => {
            let exhausted = record.attempt_count >= settings.max_attempts;
            let next_retry_at = (!exhausted).then(|| {
                finished_at
                    + backoff::to_chrono(backoff::delay(
                        settings.retry_base,
                        settings.retry_cap,
                        (record.attempt_count - 1).max(0) as u32,
                    ))
            });

            let error_message = message.clone();
            PrinterDispatchRepository::update(uow.connection(), record, finished_at, |active| {
                active.last_error = Set(Some(error_message));
                active.next_retry_at = Set(next_retry_at);
                active.response_data = Set(response_body);
            })
            .await?;

            let mut active: order::ActiveModel = current.clone().into();
            active.printer_send_status = Set(PrinterSendStatus::SentFailed);
            active.printer_error_message = Set(Some(message.clone()));
            if exhausted {
                active.needs_manual_review = Set(true);
                active.manual_review_reason = Set(Some("printer_retries_exhausted".into()));
            }
            let saved = OrderRepository::save(uow.connection(), &current, active, finished_at).await?;
            uow.commit().await?;

            tracing::warn!(
                order_id,
                attempt,
                exhausted,
                error = %message,
                "Print house dispatch failed"
            );

            if exhausted {
                state.events.publish(DomainEvent::ManualReview {
                    order_id,
                    reason: "printer_retries_exhausted".into(),
                });
            }

            if saved.cancel_requested_at.is_some() {
                // The vendor never took the order, so the queued cancel applies directly.
                let request =
                    TransitionRequest::new(order_id, OrderStatus::Cancelled, Trigger::Cancel, actor);
                let cancelled = orders::transition(state, request).await?;
                return Ok(DispatchOutcome::Failed {
                    order: cancelled,
                    message,
                });
            }

            Ok(DispatchOutcome::Failed {
                order: saved,
                message,
            })
        }
    }
}

/// Asks the print house to drop an order it already holds.
pub async fn forward_cancel(state: &AppState, order_id: i32, actor: &str) -> Result<CancelOutcome> {
    let settings = PrinterSettings::load(state).await?;
    let order = load_order(state, order_id).await?;

    if order.order_status()? == OrderStatus::Cancelled {
        return Ok(CancelOutcome::Cancelled(order));
    }
    if !order.printer_send_status.is_acknowledged() {
        return Err(AppError::GuardFailed(GuardReason::PrinterNotAcknowledged));
    }

    let payload = json!({
        "source_app_id": settings.source_app_id,
        "order_id": order.external_key(),
        "order_no": order.order_number,
        "reason": order.cancel_reason.clone().unwrap_or_default(),
    });

    let response = state.printer.cancel_order(&settings, &payload).await;
    let acknowledged = matches!(&response, Ok(reply) if reply.is_acknowledged());

    let now = state.clock.now();
    let db_connection = state.db.get_connection();
    if let Some(record) = PrinterDispatchRepository::find_by_order(db_connection, order_id).await? {
        PrinterDispatchRepository::update(db_connection, record, now, |active| {
            active.cancel_forwarded_at = Set(Some(now));
            if acknowledged {
                active.cancel_acknowledged_at = Set(Some(now));
            }
        })
        .await?;
    }

    if acknowledged {
        let request = TransitionRequest::new(
            order_id,
            OrderStatus::Cancelled,
            Trigger::PrinterCancelAck,
            actor,
        );
        let cancelled = orders::transition(state, request).await?;
        return Ok(CancelOutcome::Cancelled(cancelled));
    }

    match &response {
        Ok(reply) => tracing::warn!(order_id, reply = ?reply.classify(), "Print house refused cancel"),
        Err(err) => tracing::warn!(order_id, error = %err, "Cancel forward failed"),
    }

    Ok(CancelOutcome::Queued(load_order(state, order_id).await?))
}

/// Re-sends failed dispatches whose retry time has come.
pub async fn retry_tick(state: &AppState) -> Result<RetryReport> {
    let due = PrinterDispatchRepository::list_retry_due(
        state.db.get_connection(),
        state.clock.now(),
        state.config.scheduler.batch_size,
    )
    .await?;

    let mut report = RetryReport::default();

    for record in due {
        let order = match load_order(state, record.order_id).await {
            Ok(order) => order,
            Err(err) => {
                tracing::warn!(order_id = record.order_id, error = %err, "Retry skipped");
                continue;
            }
        };

        let dispatchable = matches!(
            order.order_status(),
            Ok(OrderStatus::SelectionCompleted | OrderStatus::Printing)
        );
        if !dispatchable
            || order.needs_manual_review
            || order.printer_send_status != PrinterSendStatus::SentFailed
        {
            continue;
        }

        report.attempted += 1;
        match dispatch(state, order.id, SYSTEM_ACTOR).await {
            Ok(DispatchOutcome::Sent(_)) => report.sent += 1,
            Ok(DispatchOutcome::Failed { .. }) => report.failed += 1,
            Err(err) => {
                report.failed += 1;
                tracing::warn!(order_id = order.id, error = %err, "Dispatch retry errored");
            }
        }
    }

    Ok(report)
}

/// Signed shipping update from the print house. Unknown orders are acknowledged
/// so the vendor stops retrying.
pub async fn logistics_callback(
    state: &AppState,
    body: &[u8],
    signature: Option<&str>,
) -> Result<CallbackAck> {
    let settings = PrinterSettings::load(state).await?;
    verify_signature(&settings.callback_secret, body, signature)?;

    let callback: LogisticsCallback = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidParams(format!("Malformed logistics callback: {e}")))?;
    if callback.tracking_number.trim().is_empty() {
        return Err(AppError::InvalidParams("tracking_number is required".into()));
    }

    let orders = OrderRepository::find_by_number(state.db.get_connection(), &callback.order_number)
        .await?
        .into_iter()
        .filter(|order| {
            callback
                .product_category
                .as_deref()
                .is_none_or(|category| category == order.product_category)
        })
        .collect::<Vec<_>>();

    if orders.is_empty() {
        tracing::warn!(
            order_number = %callback.order_number,
            "Logistics callback for unknown order ignored"
        );
        return Ok(CallbackAck {
            success: true,
            message: "order not found, ignored".into(),
        });
    }

    for order in orders {
        apply_logistics(state, &order, &callback).await?;
    }

    Ok(CallbackAck {
        success: true,
        message: "ok".into(),
    })
}

async fn apply_logistics(
    state: &AppState,
    order: &order::Model,
    callback: &LogisticsCallback,
) -> Result<()> {
    let status = order.order_status()?;
    if status.is_terminal() {
        tracing::warn!(order_id = order.id, status = %status, "Logistics update for closed order");
        return Ok(());
    }

    let now = state.clock.now();
    let logistics_info = json!({
        "company": callback.logistics_company,
        "tracking_number": callback.tracking_number.trim(),
        "status": callback.status,
        "remark": callback.remark,
        "update_time": now.format("%Y-%m-%d %H:%M:%S").to_string(),
    });

    orders::update_fields(
        state,
        order.id,
        |_| Ok(()),
        move |active| {
            active.logistics_info = Set(Some(logistics_info));
            active.printer_send_status = Set(PrinterSendStatus::LogisticsUpdated);
        },
    )
    .await?;

    tracing::info!(
        order_id = order.id,
        tracking_number = %callback.tracking_number,
        "Logistics recorded"
    );

    let mut status = status;
    if status == OrderStatus::Printing {
        let request = TransitionRequest::new(
            order.id,
            OrderStatus::PendingShipment,
            Trigger::LogisticsCallback,
            VENDOR_ACTOR,
        );
        orders::transition(state, request).await?;
        status = OrderStatus::PendingShipment;
    }

    match status {
        OrderStatus::PendingShipment => {
            let request = TransitionRequest::new(
                order.id,
                OrderStatus::Shipped,
                Trigger::LogisticsCallback,
                VENDOR_ACTOR,
            );
            orders::transition(state, request).await?;
        }
        OrderStatus::Shipped => {}
        other => {
            tracing::warn!(
                order_id = order.id,
                status = %other,
                "Logistics update before production started"
            );
            orders::flag_manual_review(state, order.id, "logistics_before_printing").await?;
        }
    }

    Ok(())
}
