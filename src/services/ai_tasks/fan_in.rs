use sea_orm::ActiveValue::Set;

use crate::{
    AppState,
    error::{AppError, GuardReason, Result},
    infrastructure::db::{
        entities::{
            ai_task::AiTaskStatus,
            order::{self, OrderStatus},
        },
        repositories::{AiTaskRepository, OrderRepository},
    },
    services::{
        ai_tasks::tasks::submit,
        orders::{self, SYSTEM_ACTOR, TransitionRequest, Trigger},
    },
};

/// Folds the order's active task outcomes into the order.
///
/// All completed: render images are attached and the order moves to
/// pending_selection. All failed: back to retouching. Otherwise only the
/// failure flag is kept current.
pub async fn fan_in(state: &AppState, order_id: i32) -> Result<()> {
    let db_connection = state.db.get_connection();

    let Some(order) = OrderRepository::find_by_id(db_connection, order_id).await? else {
        return Ok(());
    };
    if order.order_status()? != OrderStatus::AiProcessing {
        return Ok(());
    }

    let tasks = AiTaskRepository::list_active_for_order(db_connection, order_id).await?;
    if tasks.is_empty() {
        return Ok(());
    }

    let completed = tasks
        .iter()
        .filter(|task| task.status == AiTaskStatus::Completed)
        .collect::<Vec<_>>();
    let failed = tasks
        .iter()
        .filter(|task| task.status == AiTaskStatus::Failed)
        .collect::<Vec<_>>();
    let last_error = failed.iter().rev().find_map(|task| task.last_error.clone());

    if completed.len() == tasks.len() {
        let now = state.clock.now();
        let uow = state.db.unit_of_work().await?;
        let locked = uow.order_for_update(order_id).await?;
        if locked.order_status()? != OrderStatus::AiProcessing {
            uow.rollback().await?;
            return Ok(());
        }

        let mut attached = 0;
        for task in &completed {
            let Some(result_path) = task.result_image_path.as_deref() else {
                continue;
            };
            if OrderRepository::attach_render(uow.connection(), order_id, result_path, task.id, now)
                .await?
            {
                attached += 1;
            }
        }
        uow.commit().await?;

        if attached == 0 {
            tracing::debug!(order_id, "Renders already attached");
        }

        let hd_image = completed[0].result_image_path.clone();
        let request = TransitionRequest::new(
            order_id,
            OrderStatus::PendingSelection,
            Trigger::AiCompleted,
            SYSTEM_ACTOR,
        );
        orders::transition_with(state, request, move |active| {
            active.hd_image = Set(hd_image);
            active.has_failed_task = Set(false);
            active.ai_last_error = Set(None);
        })
        .await?;

        tracing::info!(order_id, renders = completed.len(), "All AI tasks completed");
        return Ok(());
    }

    if failed.len() == tasks.len() {
        let request = TransitionRequest::new(
            order_id,
            OrderStatus::Retouching,
            Trigger::AiExhausted,
            SYSTEM_ACTOR,
        );
        orders::transition_with(state, request, move |active| {
            active.has_failed_task = Set(true);
            active.ai_last_error = Set(last_error);
        })
        .await?;

        tracing::warn!(order_id, "Every AI task failed, order returned to retouching");
        return Ok(());
    }

    let has_failure = !failed.is_empty();
    if order.has_failed_task != has_failure || (has_failure && order.ai_last_error != last_error) {
        orders::update_fields(
            state,
            order_id,
            |_| Ok(()),
            move |active| {
                active.has_failed_task = Set(has_failure);
                active.ai_last_error = Set(if has_failure { last_error } else { None });
            },
        )
        .await?;
    }

    Ok(())
}

/// Sends the order's tasks to their providers and moves it into ai_processing.
pub async fn start_order(
    state: &AppState,
    order_id: i32,
    actor: &str,
    expected_version: Option<i32>,
) -> Result<order::Model> {
    let order = OrderRepository::find_by_id(state.db.get_connection(), order_id)
        .await?
        .ok_or(AppError::OrderNotFound)?;
    orders::check_version(&order, expected_version)?;

    let status = order.order_status()?;
    if status == OrderStatus::AiProcessing {
        return Ok(order);
    }
    if status != OrderStatus::Retouching {
        return Err(AppError::IllegalTransition {
            from: status,
            to: OrderStatus::AiProcessing,
        });
    }
    if order
        .final_image
        .as_deref()
        .is_none_or(|path| path.trim().is_empty())
    {
        return Err(AppError::GuardFailed(GuardReason::FinalImageMissing));
    }

    let tasks = AiTaskRepository::list_active_for_order(state.db.get_connection(), order_id).await?;
    if tasks.is_empty() {
        return Err(AppError::GuardFailed(GuardReason::NoAiTasks));
    }

    for task in tasks.iter().filter(|task| task.status == AiTaskStatus::Pending) {
        if let Err(err) = submit(state, task.id).await {
            tracing::warn!(order_id, task_id = %task.id, error = %err, "Task submit failed");
        }
    }

    let request = TransitionRequest::new(
        order_id,
        OrderStatus::AiProcessing,
        Trigger::AiStarted,
        actor,
    )
    .expecting(expected_version);
    orders::transition(state, request).await?;

    fan_in(state, order_id).await?;

    OrderRepository::find_by_id(state.db.get_connection(), order_id)
        .await?
        .ok_or(AppError::OrderNotFound)
}
