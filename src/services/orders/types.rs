use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infrastructure::db::entities::{
    ai_task::{self, AiTaskStatus},
    order::{self, OrderStatus, PrinterSendStatus},
    order_event, order_image,
};

/// Actor recorded for transitions the system performs on its own.
pub const SYSTEM_ACTOR: &str = "system";

/// What caused a transition. Stored on the event log as its snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Payment,
    Admin,
    ShootingStarted,
    AiStarted,
    AiCompleted,
    AiExhausted,
    SelectionConfirmed,
    DeadlineExpired,
    PrinterAck,
    SkipProduction,
    ProductionComplete,
    LogisticsCallback,
    Cancel,
    PrinterCancelAck,
    Refund,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Admin => "admin",
            Self::ShootingStarted => "shooting_started",
            Self::AiStarted => "ai_started",
            Self::AiCompleted => "ai_completed",
            Self::AiExhausted => "ai_exhausted",
            Self::SelectionConfirmed => "selection_confirmed",
            Self::DeadlineExpired => "deadline_expired",
            Self::PrinterAck => "printer_ack",
            Self::SkipProduction => "skip_production",
            Self::ProductionComplete => "production_complete",
            Self::LogisticsCallback => "logistics_callback",
            Self::Cancel => "cancel",
            Self::PrinterCancelAck => "printer_cancel_ack",
            Self::Refund => "refund",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub order_id: i32,
    pub target: OrderStatus,
    pub trigger: Trigger,
    pub actor: String,
    pub expected_version: Option<i32>,
}

impl TransitionRequest {
    pub fn new(order_id: i32, target: OrderStatus, trigger: Trigger, actor: &str) -> Self {
        Self {
            order_id,
            target,
            trigger,
            actor: actor.to_string(),
            expected_version: None,
        }
    }

    pub fn expecting(mut self, expected_version: Option<i32>) -> Self {
        self.expected_version = expected_version;
        self
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "order", rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled(order::Model),
    /// Waiting on the print house to acknowledge the cancel.
    Queued(order::Model),
}

impl CancelOutcome {
    pub fn order(&self) -> &order::Model {
        match self {
            Self::Cancelled(order) | Self::Queued(order) => order,
        }
    }

    pub fn into_order(self) -> order::Model {
        match self {
            Self::Cancelled(order) | Self::Queued(order) => order,
        }
    }
}

/// Confirmed payment reported by the payment collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSignal {
    pub order_number: String,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpireReport {
    pub auto_confirmed: u32,
    pub flagged: u32,
    pub cancel_escalated: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: Uuid,
    pub status: AiTaskStatus,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub result_image_path: Option<String>,
}

impl From<ai_task::Model> for TaskSummary {
    fn from(value: ai_task::Model) -> Self {
        TaskSummary {
            id: value.id,
            status: value.status,
            attempt_count: value.attempt_count,
            last_error: value.last_error,
            result_image_path: value.result_image_path,
        }
    }
}

/// Read model served to admin and customer surfaces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: i32,
    pub order_number: String,
    pub product_category: String,
    pub status: OrderStatus,
    pub printer_send_status: PrinterSendStatus,
    pub need_confirmation: bool,
    pub franchisee_confirmed: bool,
    pub skipped_production: bool,
    pub has_failed_task: bool,
    pub ai_last_error: Option<String>,
    pub needs_manual_review: bool,
    pub manual_review_reason: Option<String>,
    pub printer_error_message: Option<String>,
    pub cancel_requested_at: Option<DateTime<Utc>>,
    pub confirmation_deadline: Option<DateTime<Utc>>,
    pub selection_extra_cents: i64,
    pub selection_extra_paid: bool,
    pub tracking_number: Option<String>,
    pub version: i32,
    pub images: Vec<order_image::Model>,
    pub tasks: Vec<TaskSummary>,
    pub events: Vec<order_event::Model>,
}

impl OrderView {
    pub fn assemble(
        order: order::Model,
        status: OrderStatus,
        images: Vec<order_image::Model>,
        tasks: Vec<ai_task::Model>,
        events: Vec<order_event::Model>,
    ) -> Self {
        OrderView {
            tracking_number: order.tracking_number().map(str::to_string),
            id: order.id,
            order_number: order.order_number,
            product_category: order.product_category,
            status,
            printer_send_status: order.printer_send_status,
            need_confirmation: order.need_confirmation,
            franchisee_confirmed: order.franchisee_confirmed,
            skipped_production: order.skipped_production,
            has_failed_task: order.has_failed_task,
            ai_last_error: order.ai_last_error,
            needs_manual_review: order.needs_manual_review,
            manual_review_reason: order.manual_review_reason,
            printer_error_message: order.printer_error_message,
            cancel_requested_at: order.cancel_requested_at,
            confirmation_deadline: order.confirmation_deadline,
            selection_extra_cents: order.selection_extra_cents,
            selection_extra_paid: order.selection_extra_paid,
            version: order.version,
            images,
            tasks: tasks.into_iter().map(TaskSummary::from).collect(),
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_names_match_serialized_form() {
        for trigger in [
            Trigger::Payment,
            Trigger::AiExhausted,
            Trigger::PrinterCancelAck,
            Trigger::SkipProduction,
        ] {
            let serialized = serde_json::to_value(trigger).unwrap();
            assert_eq!(serialized, trigger.as_str());
        }
    }
}
