use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AppState,
    infrastructure::db::entities::order::{self, OrderStatus, PrinterSendStatus},
};

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,

    #[serde(default)]
    pub params: Value,
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub result: T,
    pub id: Option<Value>,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(result: T, id: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            result,
            id,
        }
    }
}

pub(crate) fn default_actor() -> String {
    "admin".to_string()
}

/// Params of methods that only name an order and who acts on it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionParams {
    pub order_id: i32,

    #[serde(default = "default_actor")]
    pub actor: String,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i32,
    pub order_number: String,
    pub product_category: String,
    pub status: OrderStatus,
    pub printer_send_status: PrinterSendStatus,
    pub needs_manual_review: bool,
    pub manual_review_reason: Option<String>,
    pub version: i32,
}

impl TryFrom<order::Model> for OrderResponse {
    type Error = crate::error::AppError;

    fn try_from(order: order::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            status: order.order_status()?,
            id: order.id,
            order_number: order.order_number,
            product_category: order.product_category,
            printer_send_status: order.printer_send_status,
            needs_manual_review: order.needs_manual_review,
            manual_review_reason: order.manual_review_reason,
            version: order.version,
        })
    }
}
