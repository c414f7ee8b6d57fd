use crate::{
    api::types::{
        CancelOrderParams, CancelOrderResponse, CreateOrderParams, GetOrderParams,
        OrderResponse, ProductionCompleteParams, RecordRetouchParams, RecordShootingParams,
        TransitionOrderParams,
    },
    error::Result,
    services::orders::{self as order_service, CancelOutcome, OrderView},
};

use super::app_state;

pub async fn create_order(params: CreateOrderParams) -> Result<OrderResponse> {
    let app_state = app_state(params.state)?;

    let order = order_service::create_order(&app_state, params.draft).await?;
    OrderResponse::try_from(order)
}

pub async fn get_order(params: GetOrderParams) -> Result<OrderView> {
    let app_state = app_state(params.state)?;

    order_service::order_view(&app_state, params.order_id).await
}

pub async fn transition_order(params: TransitionOrderParams) -> Result<OrderResponse> {
    let app_state = app_state(params.state)?;

    let order = order_service::admin_transition(
        &app_state,
        params.order_id,
        params.target,
        &params.actor,
        params.expected_version,
    )
    .await?;

    OrderResponse::try_from(order)
}

pub async fn cancel_order(params: CancelOrderParams) -> Result<CancelOrderResponse> {
    let app_state = app_state(params.state)?;

    let outcome = order_service::request_cancel(
        &app_state,
        params.order_id,
        params.reason,
        &params.actor,
        params.expected_version,
    )
    .await?;

    let label = match outcome {
        CancelOutcome::Cancelled(_) => "cancelled",
        CancelOutcome::Queued(_) => "queued",
    };

    Ok(CancelOrderResponse {
        outcome: label,
        order: OrderResponse::try_from(outcome.into_order())?,
    })
}

pub async fn record_shooting(params: RecordShootingParams) -> Result<OrderResponse> {
    let app_state = app_state(params.state)?;

    let order = order_service::record_shooting(
        &app_state,
        params.order_id,
        params.original_image,
        &params.actor,
    )
    .await?;

    OrderResponse::try_from(order)
}

pub async fn record_retouch(params: RecordRetouchParams) -> Result<OrderResponse> {
    let app_state = app_state(params.state)?;

    let order = order_service::record_retouch(
        &app_state,
        params.order_id,
        params.final_image,
        params.final_image_clean,
        &params.actor,
    )
    .await?;

    OrderResponse::try_from(order)
}

pub async fn production_complete(params: ProductionCompleteParams) -> Result<OrderResponse> {
    let app_state = app_state(params.state)?;

    let order =
        order_service::record_production_complete(&app_state, params.order_id, &params.actor)
            .await?;

    OrderResponse::try_from(order)
}
