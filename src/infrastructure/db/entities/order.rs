use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub order_number: String,

    pub product_category: String,

    pub customer_name: String,

    pub customer_phone: String,

    #[sea_orm(nullable)]
    pub customer_address: Option<String>,

    #[sea_orm(nullable)]
    pub logistics_info: Option<Json>,

    #[sea_orm(nullable)]
    pub size: Option<String>,

    #[sea_orm(nullable)]
    pub style_name: Option<String>,

    #[sea_orm(nullable)]
    pub product_name: Option<String>,

    #[sea_orm(nullable)]
    pub product_type: Option<String>,

    pub price_cents: i64,

    pub commission_cents: i64,

    #[sea_orm(nullable)]
    pub franchisee_id: Option<i32>,

    #[sea_orm(nullable)]
    pub promotion_code: Option<String>,

    #[sea_orm(nullable)]
    pub referrer_user_id: Option<i32>,

    pub source_type: SourceType,

    #[sea_orm(nullable)]
    pub openid: Option<String>,

    #[sea_orm(nullable)]
    pub transaction_id: Option<String>,

    #[sea_orm(nullable)]
    pub paid_amount_cents: Option<i64>,

    #[sea_orm(nullable)]
    pub coupon_code: Option<String>,

    /// Raw stored status. Read it through [`Model::order_status`].
    pub status: String,

    pub printer_send_status: PrinterSendStatus,

    pub need_confirmation: bool,

    pub franchisee_confirmed: bool,

    pub skipped_production: bool,

    pub has_failed_task: bool,

    #[sea_orm(nullable)]
    pub ai_last_error: Option<String>,

    pub needs_manual_review: bool,

    #[sea_orm(nullable)]
    pub manual_review_reason: Option<String>,

    #[sea_orm(nullable)]
    pub printer_error_message: Option<String>,

    #[sea_orm(nullable)]
    pub cancel_requested_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub cancel_reason: Option<String>,

    #[sea_orm(nullable)]
    pub refund_key: Option<String>,

    pub selection_extra_cents: i64,

    pub selection_extra_paid: bool,

    #[sea_orm(nullable)]
    pub original_image: Option<String>,

    #[sea_orm(nullable)]
    pub final_image: Option<String>,

    #[sea_orm(nullable)]
    pub final_image_clean: Option<String>,

    #[sea_orm(nullable)]
    pub hd_image: Option<String>,

    #[sea_orm(nullable)]
    pub hd_image_clean: Option<String>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub payment_time: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub shooting_completed_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub retouch_completed_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub confirmation_deadline: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub franchisee_confirmed_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub completed_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub shipped_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub cancelled_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub refunded_at: Option<DateTimeUtc>,

    pub version: i32,
}

impl Model {
    pub fn order_status(&self) -> Result<OrderStatus, AppError> {
        OrderStatus::normalize(&self.status).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Order {} carries unknown status '{}'",
                self.id, self.status
            ))
        })
    }

    /// Deterministic key the print house deduplicates on.
    pub fn external_key(&self) -> String {
        format!("{}-{}", self.order_number, self.product_category)
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.logistics_info
            .as_ref()?
            .get("tracking_number")?
            .as_str()
            .filter(|number| !number.is_empty())
    }

    pub fn is_paid(&self) -> bool {
        self.transaction_id.is_some() || self.payment_time.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Unpaid,
    Paid,
    Shooting,
    Retouching,
    AiProcessing,
    PendingSelection,
    SelectionCompleted,
    Printing,
    PendingShipment,
    Shipped,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 12] = [
        OrderStatus::Unpaid,
        OrderStatus::Paid,
        OrderStatus::Shooting,
        OrderStatus::Retouching,
        OrderStatus::AiProcessing,
        OrderStatus::PendingSelection,
        OrderStatus::SelectionCompleted,
        OrderStatus::Printing,
        OrderStatus::PendingShipment,
        OrderStatus::Shipped,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Shooting => "shooting",
            Self::Retouching => "retouching",
            Self::AiProcessing => "ai_processing",
            Self::PendingSelection => "pending_selection",
            Self::SelectionCompleted => "selection_completed",
            Self::Printing => "printing",
            Self::PendingShipment => "pending_shipment",
            Self::Shipped => "shipped",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Maps stored values, including legacy aliases, onto the closed enum.
    pub fn normalize(raw: &str) -> Option<Self> {
        let status = match raw.trim() {
            "unpaid" => Self::Unpaid,
            "paid" | "pending" => Self::Paid,
            "shooting" => Self::Shooting,
            "retouching" => Self::Retouching,
            "ai_processing" | "processing" => Self::AiProcessing,
            "pending_selection" | "hd_ready" => Self::PendingSelection,
            "selection_completed" | "completed" => Self::SelectionCompleted,
            "printing" | "manufacturing" => Self::Printing,
            "pending_shipment" => Self::PendingShipment,
            "shipped" => Self::Shipped,
            "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            _ => return None,
        };
        Some(status)
    }

    /// Every raw value that normalizes onto this status.
    pub fn stored_values(&self) -> &'static [&'static str] {
        match self {
            Self::Paid => &["paid", "pending"],
            Self::AiProcessing => &["ai_processing", "processing"],
            Self::PendingSelection => &["pending_selection", "hd_ready"],
            Self::SelectionCompleted => &["selection_completed", "completed"],
            Self::Printing => &["printing", "manufacturing"],
            Self::Unpaid => &["unpaid"],
            Self::Shooting => &["shooting"],
            Self::Retouching => &["retouching"],
            Self::PendingShipment => &["pending_shipment"],
            Self::Shipped => &["shipped"],
            Self::Cancelled => &["cancelled"],
            Self::Refunded => &["refunded"],
        }
    }

    /// Position on the main spine; side branches have none.
    pub fn spine_rank(&self) -> Option<u8> {
        match self {
            Self::Unpaid => Some(0),
            Self::Paid => Some(1),
            Self::Shooting => Some(2),
            Self::Retouching => Some(3),
            Self::AiProcessing => Some(4),
            Self::PendingSelection => Some(5),
            Self::SelectionCompleted => Some(6),
            Self::Printing => Some(7),
            Self::PendingShipment => Some(8),
            Self::Shipped => Some(9),
            Self::Cancelled | Self::Refunded => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_terminal() && *self != Self::Shipped
    }

    /// Whether the order has been handed to the print house or beyond.
    pub fn is_in_production(&self) -> bool {
        matches!(self, Self::Printing | Self::PendingShipment)
    }

    pub fn accepts(&self, target: &OrderStatus) -> bool {
        use OrderStatus::*;

        if self == target {
            return true;
        }

        match (self, target) {
            (_, Cancelled) => self.can_cancel(),
            (from, Refunded) => from
                .spine_rank()
                .is_some_and(|rank| (1..=9).contains(&rank)),
            // Every active sub-task exhausted its retries
            (AiProcessing, Retouching) => true,
            (from, to) => match (from.spine_rank(), to.spine_rank()) {
                (Some(from_rank), Some(to_rank)) => to_rank == from_rank + 1,
                _ => false,
            },
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PrinterSendStatus {
    #[default]
    #[sea_orm(string_value = "not_sent")]
    NotSent,

    #[sea_orm(string_value = "sending")]
    Sending,

    #[sea_orm(string_value = "sent_success")]
    SentSuccess,

    #[sea_orm(string_value = "sent_failed")]
    SentFailed,

    #[sea_orm(string_value = "logistics_updated")]
    LogisticsUpdated,
}

impl PrinterSendStatus {
    /// The vendor holds the order.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::SentSuccess | Self::LogisticsUpdated)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    #[sea_orm(string_value = "website")]
    Website,

    #[sea_orm(string_value = "miniprogram")]
    Miniprogram,

    #[sea_orm(string_value = "external")]
    External,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_image::Entity")]
    OrderImage,

    #[sea_orm(
        belongs_to = "super::franchisee::Entity",
        from = "Column::FranchiseeId",
        to = "super::franchisee::Column::Id"
    )]
    Franchisee,
}

impl Related<super::order_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderImage.def()
    }
}

impl Related<super::franchisee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Franchisee.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_aliases_normalize_onto_canonical_states() {
        assert_eq!(OrderStatus::normalize("pending"), Some(OrderStatus::Paid));
        assert_eq!(
            OrderStatus::normalize("processing"),
            Some(OrderStatus::AiProcessing)
        );
        assert_eq!(
            OrderStatus::normalize("manufacturing"),
            Some(OrderStatus::Printing)
        );
        assert_eq!(
            OrderStatus::normalize("completed"),
            Some(OrderStatus::SelectionCompleted)
        );
        assert_eq!(
            OrderStatus::normalize("hd_ready"),
            Some(OrderStatus::PendingSelection)
        );
        assert_eq!(OrderStatus::normalize("delivered"), None);
    }

    #[test]
    fn canonical_names_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::normalize(status.as_str()), Some(status));
            for raw in status.stored_values() {
                assert_eq!(OrderStatus::normalize(raw), Some(status));
            }
        }
    }

    #[test]
    fn transition_table_matches_allowed_edges() {
        use OrderStatus::*;

        let allowed: &[(OrderStatus, OrderStatus)] = &[
            (Unpaid, Paid),
            (Paid, Shooting),
            (Shooting, Retouching),
            (Retouching, AiProcessing),
            (AiProcessing, PendingSelection),
            (PendingSelection, SelectionCompleted),
            (SelectionCompleted, Printing),
            (Printing, PendingShipment),
            (PendingShipment, Shipped),
            (AiProcessing, Retouching),
        ];
        let cancellable = [
            Unpaid,
            Paid,
            Shooting,
            Retouching,
            AiProcessing,
            PendingSelection,
            SelectionCompleted,
            Printing,
            PendingShipment,
        ];
        let refundable = [
            Paid,
            Shooting,
            Retouching,
            AiProcessing,
            PendingSelection,
            SelectionCompleted,
            Printing,
            PendingShipment,
            Shipped,
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = from == to
                    || allowed.contains(&(from, to))
                    || (to == Cancelled && cancellable.contains(&from))
                    || (to == Refunded && refundable.contains(&from));
                assert_eq!(
                    from.accepts(&to),
                    expected,
                    "accepts({from}, {to}) should be {expected}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_only_accept_themselves() {
        for terminal in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            for target in OrderStatus::ALL {
                assert_eq!(terminal.accepts(&target), terminal == target);
            }
        }
    }
}
