use std::{future::Future, pin::Pin};

use crate::{
    AppState,
    error::Result,
    infrastructure::db::entities::order::{self, OrderStatus},
    services::{
        ai_tasks, billing,
        orders::{
            transition::transition,
            types::{TransitionRequest, Trigger},
        },
        printer, selection,
    },
};

type HookFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Effects of entering `entered`. Runs after the transition committed.
///
/// Boxed because the effects start further transitions.
pub fn on_enter<'a>(
    state: &'a AppState,
    order: &'a order::Model,
    entered: OrderStatus,
    actor: &'a str,
) -> HookFuture<'a> {
    Box::pin(async move {
        let result = run(state, order, entered, actor).await;

        if let Err(err) = result {
            tracing::warn!(
                order_id = order.id,
                status = %entered,
                error = %err,
                "On-entry effect failed"
            );
        }
    })
}

async fn run(
    state: &AppState,
    order: &order::Model,
    entered: OrderStatus,
    actor: &str,
) -> Result<()> {
    match entered {
        OrderStatus::PendingSelection => {
            selection::issue_view_token(state, order).await?;
        }
        OrderStatus::SelectionCompleted if order.skipped_production => {
            let request = TransitionRequest::new(
                order.id,
                OrderStatus::Printing,
                Trigger::SkipProduction,
                actor,
            );
            transition(state, request).await?;
        }
        OrderStatus::SelectionCompleted => {
            printer::dispatch(state, order.id, actor).await?;
        }
        OrderStatus::Cancelled | OrderStatus::Refunded => {
            selection::revoke_tokens(state, order.id).await?;
            ai_tasks::cancel_for_order(state, order.id, actor).await?;
            billing::release_selection_charge(state, order).await?;
        }
        _ => {}
    }

    Ok(())
}
