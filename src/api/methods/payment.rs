use crate::{
    api::types::{
        ConsumeCouponParams, ExtraPaidParams, OrderResponse, OrdersResponse, PaymentPaidParams,
        RefundParams,
    },
    error::Result,
    infrastructure::db::entities::{coupon_usage, order},
    services::{billing, orders as order_service, selection as selection_service},
};

use super::app_state;

fn orders_response(orders: Vec<order::Model>) -> Result<OrdersResponse> {
    Ok(OrdersResponse {
        orders: orders
            .into_iter()
            .map(OrderResponse::try_from)
            .collect::<Result<_>>()?,
    })
}

pub async fn payment_paid(params: PaymentPaidParams) -> Result<OrdersResponse> {
    let app_state = app_state(params.state)?;

    let orders = order_service::payment_paid(&app_state, params.signal).await?;
    orders_response(orders)
}

pub async fn refund(params: RefundParams) -> Result<OrdersResponse> {
    let app_state = app_state(params.state)?;

    let orders = order_service::refund(&app_state, &params.order_number, &params.reason).await?;
    orders_response(orders)
}

pub async fn extra_paid(params: ExtraPaidParams) -> Result<OrderResponse> {
    let app_state = app_state(params.state)?;

    let order = selection_service::record_extra_payment(
        &app_state,
        params.order_id,
        &params.transaction_id,
    )
    .await?;

    OrderResponse::try_from(order)
}

pub async fn consume_coupon(params: ConsumeCouponParams) -> Result<coupon_usage::Model> {
    let app_state = app_state(params.state)?;

    billing::consume_coupon(&app_state, &params.code, params.order_id).await
}
