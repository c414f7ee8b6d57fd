use chrono::Duration;
use sea_orm::ActiveValue::Set;

use crate::{
    AppState,
    error::{AppError, Result},
    infrastructure::db::{
        entities::{
            order::{self, OrderStatus},
            order_image::ImageKind,
        },
        repositories::{
            AiTaskRepository, EventRepository, FranchiseeRepository, OrderDraft, OrderRepository,
            generate_order_number,
        },
    },
    services::{
        events::DomainEvent,
        orders::{
            guards,
            transition::{check_version, transition, transition_with},
            types::{
                CancelOutcome, ExpireReport, OrderView, PaymentSignal, SYSTEM_ACTOR,
                TransitionRequest, Trigger,
            },
        },
        printer, selection,
    },
};

pub async fn create_order(state: &AppState, draft: OrderDraft) -> Result<order::Model> {
    if draft.product_category.trim().is_empty() {
        return Err(AppError::InvalidParams(
            "product_category must not be empty".into(),
        ));
    }

    if draft.customer_name.trim().is_empty() || draft.customer_phone.trim().is_empty() {
        return Err(AppError::InvalidParams(
            "customer_name and customer_phone are required".into(),
        ));
    }

    if draft.price_cents < 0 || draft.commission_cents < 0 {
        return Err(AppError::InvalidParams("amounts must not be negative".into()));
    }

    if draft.commission_cents > draft.price_cents {
        return Err(AppError::InvalidParams(
            "commission cannot exceed the order price".into(),
        ));
    }

    if draft.promotion_code.is_some() && draft.referrer_user_id.is_none() {
        return Err(AppError::InvalidParams(
            "promotion_code requires referrer_user_id".into(),
        ));
    }

    let db_connection = state.db.get_connection();

    if let Some(franchisee_id) = draft.franchisee_id {
        FranchiseeRepository::find_by_id(db_connection, franchisee_id)
            .await?
            .ok_or(AppError::FranchiseeNotFound)?;
    }

    let now = state.clock.now();
    let order_number = match draft.order_number.as_deref().map(str::trim) {
        Some(number) if !number.is_empty() => number.to_string(),
        _ => generate_order_number(now),
    };

    let order = OrderRepository::create(db_connection, &draft, order_number, now).await?;

    tracing::info!(
        order_id = order.id,
        order_number = %order.order_number,
        category = %order.product_category,
        "Order created"
    );

    Ok(order)
}

/// Locks the order, applies `updater` and writes it back without a status change.
pub async fn update_fields<V, F>(
    state: &AppState,
    order_id: i32,
    validate: V,
    updater: F,
) -> Result<order::Model>
where
    V: FnOnce(&order::Model) -> Result<()> + Send,
    F: FnOnce(&mut order::ActiveModel) + Send,
{
    let uow = state.db.unit_of_work().await?;
    let order = uow.order_for_update(order_id).await?;

    if let Err(err) = validate(&order) {
        uow.rollback().await?;
        return Err(err);
    }

    let mut active: order::ActiveModel = order.clone().into();
    updater(&mut active);

    let saved = OrderRepository::save(uow.connection(), &order, active, state.clock.now()).await?;
    uow.commit().await?;

    Ok(saved)
}

fn require_status(order: &order::Model, expected: OrderStatus) -> Result<()> {
    let status = order.order_status()?;
    if status != expected {
        return Err(AppError::IllegalTransition {
            from: status,
            to: expected,
        });
    }
    Ok(())
}

pub async fn payment_paid(state: &AppState, signal: PaymentSignal) -> Result<Vec<order::Model>> {
    let transaction_id = signal.transaction_id.trim().to_string();
    if transaction_id.is_empty() {
        return Err(AppError::InvalidParams("transaction_id is required".into()));
    }

    if signal.amount_cents < 0 {
        return Err(AppError::InvalidParams("amount must not be negative".into()));
    }

    let orders = OrderRepository::find_by_number(state.db.get_connection(), &signal.order_number)
        .await?;
    if orders.is_empty() {
        return Err(AppError::OrderNotFound);
    }

    let mut paid = Vec::with_capacity(orders.len());

    for order in orders {
        if order.transaction_id.as_deref() == Some(transaction_id.as_str()) {
            paid.push(order);
            continue;
        }

        if order.transaction_id.is_some() {
            return Err(AppError::Conflict(format!(
                "order {} was paid by another transaction",
                order.order_number
            )));
        }

        let tx = transaction_id.clone();
        let amount = signal.amount_cents;
        let paid_at = signal.paid_at;
        let record_payment = move |active: &mut order::ActiveModel| {
            active.transaction_id = Set(Some(tx));
            active.paid_amount_cents = Set(Some(amount));
            if let Some(paid_at) = paid_at {
                active.payment_time = Set(Some(paid_at));
            }
        };

        // Legacy `pending` rows already read as paid; only the payment fields are missing.
        let updated = if order.order_status()? == OrderStatus::Paid {
            let now = state.clock.now();
            let has_payment_time = order.payment_time.is_some();
            update_fields(
                state,
                order.id,
                |current| {
                    require_status(current, OrderStatus::Paid)?;
                    if current.transaction_id.is_some() {
                        return Err(AppError::Conflict(format!(
                            "order {} was paid concurrently",
                            current.order_number
                        )));
                    }
                    Ok(())
                },
                move |active| {
                    record_payment(active);
                    if paid_at.is_none() && !has_payment_time {
                        active.payment_time = Set(Some(now));
                    }
                },
            )
            .await?
        } else {
            let request =
                TransitionRequest::new(order.id, OrderStatus::Paid, Trigger::Payment, "payment");
            transition_with(state, request, record_payment).await?
        };

        paid.push(updated);
    }

    Ok(paid)
}

/// Refunds one order row. Repeating with the same `refund_key` is a no-op.
pub async fn refund_order(
    state: &AppState,
    order_id: i32,
    refund_key: &str,
    actor: &str,
) -> Result<order::Model> {
    let order = OrderRepository::find_by_id(state.db.get_connection(), order_id)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    if order.order_status()? == OrderStatus::Refunded {
        if order.refund_key.as_deref() != Some(refund_key) {
            tracing::info!(
                order_id,
                refund_key,
                "Order already refunded under another key"
            );
        }
        return Ok(order);
    }

    let key = refund_key.to_string();
    let request = TransitionRequest::new(order_id, OrderStatus::Refunded, Trigger::Refund, actor);

    transition_with(state, request, move |active| {
        active.refund_key = Set(Some(key));
    })
    .await
}

/// Refund signal from the payment collaborator; covers every row of the number.
pub async fn refund(
    state: &AppState,
    order_number: &str,
    refund_key: &str,
) -> Result<Vec<order::Model>> {
    if refund_key.trim().is_empty() {
        return Err(AppError::InvalidParams("refund reason is required".into()));
    }

    let orders = OrderRepository::find_by_number(state.db.get_connection(), order_number).await?;
    if orders.is_empty() {
        return Err(AppError::OrderNotFound);
    }

    let mut refunded = Vec::with_capacity(orders.len());
    for order in orders {
        refunded.push(refund_order(state, order.id, refund_key, "payment").await?);
    }

    Ok(refunded)
}

/// Records a finished photo shoot. A paid order moves into shooting first.
pub async fn record_shooting(
    state: &AppState,
    order_id: i32,
    original_image: Option<String>,
    actor: &str,
) -> Result<order::Model> {
    let order = OrderRepository::find_by_id(state.db.get_connection(), order_id)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    if order.order_status()? == OrderStatus::Paid {
        let request = TransitionRequest::new(
            order_id,
            OrderStatus::Shooting,
            Trigger::ShootingStarted,
            actor,
        );
        transition(state, request).await?;
    }

    let now = state.clock.now();
    let uow = state.db.unit_of_work().await?;
    let order = uow.order_for_update(order_id).await?;

    if let Err(err) = require_status(&order, OrderStatus::Shooting) {
        uow.rollback().await?;
        return Err(err);
    }

    let mut active: order::ActiveModel = order.clone().into();
    active.shooting_completed_at = Set(Some(now));
    if let Some(path) = &original_image {
        active.original_image = Set(Some(path.clone()));
    }

    let saved = OrderRepository::save(uow.connection(), &order, active, now).await?;
    if let Some(path) = &original_image {
        OrderRepository::add_image(uow.connection(), order_id, path, ImageKind::Original, None, now)
            .await?;
    }
    uow.commit().await?;

    tracing::info!(order_id, actor, "Shooting recorded");

    Ok(saved)
}

pub async fn record_retouch(
    state: &AppState,
    order_id: i32,
    final_image: String,
    final_image_clean: Option<String>,
    actor: &str,
) -> Result<order::Model> {
    if final_image.trim().is_empty() {
        return Err(AppError::InvalidParams("final_image must not be empty".into()));
    }

    let order = update_fields(
        state,
        order_id,
        |order| require_status(order, OrderStatus::Retouching),
        move |active| {
            active.final_image = Set(Some(final_image));
            if final_image_clean.is_some() {
                active.final_image_clean = Set(final_image_clean);
            }
        },
    )
    .await?;

    tracing::info!(order_id, actor, "Retouch recorded");

    Ok(order)
}

pub async fn record_production_complete(
    state: &AppState,
    order_id: i32,
    actor: &str,
) -> Result<order::Model> {
    let request = TransitionRequest::new(
        order_id,
        OrderStatus::PendingShipment,
        Trigger::ProductionComplete,
        actor,
    );
    transition(state, request).await
}

/// Cancels directly when the print house is not involved, otherwise queues
/// the request until the vendor acknowledges the cancel.
pub async fn request_cancel(
    state: &AppState,
    order_id: i32,
    reason: Option<String>,
    actor: &str,
    expected_version: Option<i32>,
) -> Result<CancelOutcome> {
    let uow = state.db.unit_of_work().await?;
    let order = uow.order_for_update(order_id).await?;

    if let Err(err) = check_version(&order, expected_version) {
        uow.rollback().await?;
        return Err(err);
    }

    let status = match order.order_status() {
        Ok(status) => status,
        Err(err) => {
            uow.rollback().await?;
            return Err(err);
        }
    };

    if status == OrderStatus::Cancelled {
        uow.rollback().await?;
        return Ok(CancelOutcome::Cancelled(order));
    }

    if !status.can_cancel() {
        uow.rollback().await?;
        return Err(AppError::IllegalTransition {
            from: status,
            to: OrderStatus::Cancelled,
        });
    }

    if !guards::printer_involved(&order, status) {
        uow.rollback().await?;

        let request = TransitionRequest::new(order_id, OrderStatus::Cancelled, Trigger::Cancel, actor)
            .expecting(expected_version);
        let cancelled = transition_with(state, request, move |active| {
            if reason.is_some() {
                active.cancel_reason = Set(reason);
            }
        })
        .await?;

        return Ok(CancelOutcome::Cancelled(cancelled));
    }

    let now = state.clock.now();
    let queued = if order.cancel_requested_at.is_none() {
        let mut active: order::ActiveModel = order.clone().into();
        active.cancel_requested_at = Set(Some(now));
        active.cancel_reason = Set(reason);
        OrderRepository::save(uow.connection(), &order, active, now).await?
    } else {
        order
    };
    uow.commit().await?;

    tracing::info!(
        order_id,
        actor,
        printer_status = ?queued.printer_send_status,
        "Cancel queued behind print house"
    );

    if queued.printer_send_status.is_acknowledged() {
        return printer::forward_cancel(state, order_id, actor).await;
    }

    Ok(CancelOutcome::Queued(queued))
}

pub async fn flag_manual_review(
    state: &AppState,
    order_id: i32,
    reason: &str,
) -> Result<order::Model> {
    let review_reason = reason.to_string();
    let order = update_fields(
        state,
        order_id,
        |_| Ok(()),
        move |active| {
            active.needs_manual_review = Set(true);
            active.manual_review_reason = Set(Some(review_reason));
        },
    )
    .await?;

    tracing::warn!(order_id, reason, "Order flagged for manual review");

    state.events.publish(DomainEvent::ManualReview {
        order_id,
        reason: reason.to_string(),
    });

    Ok(order)
}

/// Auto-confirms selections past their deadline and escalates stale cancels.
pub async fn expire_tick(state: &AppState) -> Result<ExpireReport> {
    let now = state.clock.now();
    let batch_size = state.config.scheduler.batch_size;
    let mut report = ExpireReport::default();

    let expired =
        OrderRepository::list_confirmation_expired(state.db.get_connection(), now, batch_size)
            .await?;

    for order in expired {
        let picks = OrderRepository::count_selected(state.db.get_connection(), order.id).await?;

        if picks > 0 && !guards::extra_payment_outstanding(&order) {
            match selection::confirm_order(state, order.id, Trigger::DeadlineExpired, SYSTEM_ACTOR, false)
                .await
            {
                Ok(_) => report.auto_confirmed += 1,
                Err(err) => {
                    tracing::warn!(order_id = order.id, error = %err, "Auto-confirm failed");
                    flag_manual_review(state, order.id, "auto_confirm_failed").await?;
                    report.flagged += 1;
                }
            }
        } else {
            flag_manual_review(state, order.id, "confirmation_deadline_passed").await?;
            report.flagged += 1;
        }
    }

    let cancel_timeout =
        Duration::from_std(state.config.scheduler.cancel_timeout).unwrap_or(Duration::days(1));
    let stale = OrderRepository::list_stale_cancel_requests(
        state.db.get_connection(),
        now - cancel_timeout,
        batch_size,
    )
    .await?;

    for order in stale {
        flag_manual_review(state, order.id, "cancel_not_acknowledged").await?;
        report.cancel_escalated += 1;
    }

    if report != ExpireReport::default() {
        tracing::info!(
            auto_confirmed = report.auto_confirmed,
            flagged = report.flagged,
            cancel_escalated = report.cancel_escalated,
            "Expiry pass finished"
        );
    }

    Ok(report)
}

pub async fn order_view(state: &AppState, order_id: i32) -> Result<OrderView> {
    let db_connection = state.db.get_connection();

    let order = OrderRepository::find_by_id(db_connection, order_id)
        .await?
        .ok_or(AppError::OrderNotFound)?;
    let status = order.order_status()?;

    let images = OrderRepository::list_images(db_connection, order_id).await?;
    let tasks = AiTaskRepository::list_active_for_order(db_connection, order_id).await?;
    let events = EventRepository::list_for_order(db_connection, order_id).await?;

    Ok(OrderView::assemble(order, status, images, tasks, events))
}
