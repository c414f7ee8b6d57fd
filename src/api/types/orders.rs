use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    infrastructure::db::{entities::order::OrderStatus, repositories::OrderDraft},
};

use super::common::{OrderActionParams, OrderResponse, default_actor};

pub type GetOrderParams = OrderActionParams;
pub type ProductionCompleteParams = OrderActionParams;
pub type DispatchOrderParams = OrderActionParams;
pub type IssueViewTokenParams = OrderActionParams;

#[derive(Deserialize)]
pub struct CreateOrderParams {
    #[serde(flatten)]
    pub draft: OrderDraft,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOrderParams {
    pub order_id: i32,
    pub target: OrderStatus,

    #[serde(default = "default_actor")]
    pub actor: String,

    #[serde(default)]
    pub expected_version: Option<i32>,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderParams {
    pub order_id: i32,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default = "default_actor")]
    pub actor: String,

    #[serde(default)]
    pub expected_version: Option<i32>,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderResponse {
    /// `cancelled`, or `queued` while the print house has not confirmed.
    pub outcome: &'static str,
    pub order: OrderResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordShootingParams {
    pub order_id: i32,

    #[serde(default)]
    pub original_image: Option<String>,

    #[serde(default = "default_actor")]
    pub actor: String,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRetouchParams {
    pub order_id: i32,
    pub final_image: String,

    #[serde(default)]
    pub final_image_clean: Option<String>,

    #[serde(default = "default_actor")]
    pub actor: String,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub sent: bool,
    pub message: Option<String>,
    pub order: OrderResponse,
}
