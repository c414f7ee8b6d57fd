use serde::{Deserialize, Serialize};

use crate::{AppState, services::orders::PaymentSignal};

use super::common::OrderResponse;

#[derive(Deserialize)]
pub struct PaymentPaidParams {
    #[serde(flatten)]
    pub signal: PaymentSignal,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundParams {
    pub order_number: String,
    pub reason: String,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraPaidParams {
    pub order_id: i32,
    pub transaction_id: String,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeCouponParams {
    pub code: String,
    pub order_id: i32,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersResponse {
    pub orders: Vec<OrderResponse>,
}
