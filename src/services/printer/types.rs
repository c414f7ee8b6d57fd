use serde::{Deserialize, Serialize};

use crate::infrastructure::db::entities::order;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The vendor holds the order (accepted now or already known).
    Sent(order::Model),
    Failed {
        order: order::Model,
        message: String,
    },
}

impl DispatchOutcome {
    pub fn order(&self) -> &order::Model {
        match self {
            Self::Sent(order) | Self::Failed { order, .. } => order,
        }
    }
}

/// Shipping update pushed by the print house.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticsCallback {
    #[serde(alias = "order_no")]
    pub order_number: String,
    pub product_category: Option<String>,
    #[serde(default)]
    pub logistics_company: String,
    pub tracking_number: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallbackAck {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub attempted: u32,
    pub sent: u32,
    pub failed: u32,
}
