use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue::Set, TryIntoModel};

use crate::{
    AppState,
    config::SelectionConfig,
    error::{AppError, Result},
    infrastructure::db::{
        entities::order::{self, OrderStatus},
        repositories::{EventRepository, OrderRepository},
    },
    services::{
        ai_tasks,
        events::DomainEvent,
        orders::{
            guards, hooks,
            lifecycle::{refund_order, request_cancel},
            types::{TransitionRequest, Trigger},
        },
        printer,
    },
};

fn version_conflict(order: &order::Model, expected: i32) -> AppError {
    AppError::Conflict(format!(
        "order {} is at version {}, expected {expected}",
        order.id, order.version
    ))
}

pub(crate) fn check_version(order: &order::Model, expected_version: Option<i32>) -> Result<()> {
    match expected_version {
        Some(expected) if expected != order.version => Err(version_conflict(order, expected)),
        _ => Ok(()),
    }
}

fn apply_derived_timestamps(
    active: &mut order::ActiveModel,
    order: &order::Model,
    target: OrderStatus,
    now: DateTime<Utc>,
    selection: &SelectionConfig,
) {
    match target {
        OrderStatus::Paid => {
            if order.payment_time.is_none() {
                active.payment_time = Set(Some(now));
            }
        }
        OrderStatus::AiProcessing => active.retouch_completed_at = Set(Some(now)),
        OrderStatus::PendingSelection => {
            active.completed_at = Set(Some(now));
            if order.need_confirmation {
                let window = chrono::Duration::from_std(selection.confirmation_window)
                    .unwrap_or_else(|_| chrono::Duration::days(3));
                active.confirmation_deadline = Set(Some(now + window));
            }
        }
        OrderStatus::Shipped => active.shipped_at = Set(Some(now)),
        OrderStatus::Cancelled => active.cancelled_at = Set(Some(now)),
        OrderStatus::Refunded => active.refunded_at = Set(Some(now)),
        _ => {}
    }
}

/// Moves an order along an edge of the lifecycle graph.
pub async fn transition(state: &AppState, request: TransitionRequest) -> Result<order::Model> {
    transition_with(state, request, |_| {}).await
}

/// Same as [`transition`], writing the fields set by `updater` in the same
/// row update. Guards see the order as it will be written.
///
/// Requesting the state the order is already in returns it unchanged without
/// an event. On-entry effects run after the commit; their failures are logged.
pub async fn transition_with<F>(
    state: &AppState,
    request: TransitionRequest,
    updater: F,
) -> Result<order::Model>
where
    F: FnOnce(&mut order::ActiveModel) + Send,
{
    let TransitionRequest {
        order_id,
        target,
        trigger,
        actor,
        expected_version,
    } = request;

    let uow = state.db.unit_of_work().await?;
    let order = uow.order_for_update(order_id).await?;

    if let Err(err) = check_version(&order, expected_version) {
        uow.rollback().await?;
        return Err(err);
    }

    let from = match order.order_status() {
        Ok(status) => status,
        Err(err) => {
            uow.rollback().await?;
            return Err(err);
        }
    };

    if from == target {
        uow.rollback().await?;
        return Ok(order);
    }

    if !from.accepts(&target) {
        uow.rollback().await?;
        return Err(AppError::IllegalTransition { from, to: target });
    }

    let now = state.clock.now();
    let mut active: order::ActiveModel = order.clone().into();
    active.status = Set(target.as_str().to_string());
    apply_derived_timestamps(&mut active, &order, target, now, &state.config.selection);
    updater(&mut active);

    let candidate = active.clone().try_into_model()?;
    if target == OrderStatus::SelectionCompleted
        && candidate.franchisee_confirmed
        && candidate.franchisee_confirmed_at.is_none()
    {
        active.franchisee_confirmed_at = Set(Some(now));
    }

    if let Err(err) = guards::check(uow.connection(), &candidate, from, target, trigger).await {
        uow.rollback().await?;
        tracing::debug!(
            order_id,
            from = %from,
            to = %target,
            reason = err.reason_code(),
            "Transition guard failed"
        );
        return Err(err);
    }

    let saved = OrderRepository::save(uow.connection(), &order, active, now).await?;
    EventRepository::append(
        uow.connection(),
        &saved,
        from,
        target,
        trigger.as_str(),
        &actor,
        now,
    )
    .await?;
    uow.commit().await?;

    tracing::info!(
        order_id,
        order_number = %saved.order_number,
        from = %from,
        to = %target,
        trigger = trigger.as_str(),
        actor = %actor,
        version = saved.version,
        "Order transitioned"
    );

    state.events.publish(DomainEvent::Transition {
        order_id,
        order_number: saved.order_number.clone(),
        from,
        to: target,
        trigger: trigger.as_str().to_string(),
        actor: actor.clone(),
        at: now,
    });

    if target == OrderStatus::Cancelled
        && order.is_paid()
        && !order.printer_send_status.is_acknowledged()
    {
        state.events.publish(DomainEvent::RefundRequested {
            order_id,
            order_number: saved.order_number.clone(),
            amount_cents: order.paid_amount_cents.unwrap_or(order.price_cents),
            reason: saved.cancel_reason.clone(),
        });
    }

    hooks::on_enter(state, &saved, target, &actor).await;

    Ok(saved)
}

/// Entry point for operator-driven moves. Targets with side effects are
/// routed through the component that owns them.
pub async fn admin_transition(
    state: &AppState,
    order_id: i32,
    target: OrderStatus,
    actor: &str,
    expected_version: Option<i32>,
) -> Result<order::Model> {
    match target {
        OrderStatus::AiProcessing => {
            ai_tasks::start_order(state, order_id, actor, expected_version).await
        }
        OrderStatus::Printing => {
            let order = OrderRepository::find_by_id(state.db.get_connection(), order_id)
                .await?
                .ok_or(AppError::OrderNotFound)?;
            check_version(&order, expected_version)?;

            if order.skipped_production {
                let request =
                    TransitionRequest::new(order_id, target, Trigger::SkipProduction, actor)
                        .expecting(expected_version);
                return transition(state, request).await;
            }

            match printer::dispatch_with(state, order_id, actor, expected_version).await? {
                printer::DispatchOutcome::Sent(order) => Ok(order),
                printer::DispatchOutcome::Failed { message, .. } => {
                    Err(AppError::external("printer", message))
                }
            }
        }
        OrderStatus::Cancelled => {
            let outcome = request_cancel(state, order_id, None, actor, expected_version).await?;
            Ok(outcome.into_order())
        }
        OrderStatus::Refunded => {
            let order = OrderRepository::find_by_id(state.db.get_connection(), order_id)
                .await?
                .ok_or(AppError::OrderNotFound)?;
            check_version(&order, expected_version)?;
            refund_order(state, order_id, &format!("admin:{actor}"), actor).await
        }
        _ => {
            let request = TransitionRequest::new(order_id, target, Trigger::Admin, actor)
                .expecting(expected_version);
            transition(state, request).await
        }
    }
}
