use crate::{
    api::types::{CreateTaskParams, OrderResponse, StartAiParams, TaskActionParams, TaskResponse},
    error::Result,
    services::ai_tasks as task_service,
};

use super::app_state;

pub async fn create_task(params: CreateTaskParams) -> Result<TaskResponse> {
    let app_state = app_state(params.state)?;

    let task = task_service::create_task(&app_state, params.task).await?;
    Ok(task.into())
}

pub async fn start(params: StartAiParams) -> Result<OrderResponse> {
    let app_state = app_state(params.state)?;

    let order = task_service::start_order(
        &app_state,
        params.order_id,
        &params.actor,
        params.expected_version,
    )
    .await?;

    OrderResponse::try_from(order)
}

pub async fn submit(params: TaskActionParams) -> Result<TaskResponse> {
    let app_state = app_state(params.state)?;

    let task = task_service::submit(&app_state, params.task_id).await?;
    Ok(task.into())
}

pub async fn resubmit(params: TaskActionParams) -> Result<TaskResponse> {
    let app_state = app_state(params.state)?;

    let task = task_service::resubmit(&app_state, params.task_id, &params.actor).await?;
    Ok(task.into())
}

pub async fn cancel(params: TaskActionParams) -> Result<TaskResponse> {
    let app_state = app_state(params.state)?;

    let task = task_service::cancel(&app_state, params.task_id, &params.actor).await?;
    Ok(task.into())
}
