use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "ai_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed, nullable)]
    pub order_id: Option<i32>,

    #[sea_orm(nullable)]
    pub style_category_id: Option<i32>,

    #[sea_orm(nullable)]
    pub style_image_id: Option<i32>,

    pub provider_id: i32,

    pub input_image_path: String,

    pub prompt: String,

    pub params: Json,

    #[sea_orm(nullable)]
    pub result_image_path: Option<String>,

    #[sea_orm(nullable)]
    pub provider_job_id: Option<String>,

    pub status: AiTaskStatus,

    pub attempt_count: i32,

    #[sea_orm(nullable)]
    pub last_error: Option<String>,

    pub cancel_requested: bool,

    #[sea_orm(nullable)]
    pub superseded_by: Option<Uuid>,

    #[sea_orm(nullable)]
    pub next_attempt_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub submitted_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub polled_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub finished_at: Option<DateTimeUtc>,

    pub version: i32,
}

impl Model {
    /// Counts towards order fan-in.
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none() && self.status != AiTaskStatus::Cancelled
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AiTaskStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,

    #[sea_orm(string_value = "submitting")]
    Submitting,

    #[sea_orm(string_value = "submitted")]
    Submitted,

    #[sea_orm(string_value = "polling")]
    Polling,

    #[sea_orm(string_value = "completed")]
    Completed,

    #[sea_orm(string_value = "failed")]
    Failed,

    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl AiTaskStatus {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Submitting => 1,
            Self::Submitted => 2,
            Self::Polling => 3,
            Self::Completed | Self::Failed | Self::Cancelled => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Submitted | Self::Polling)
    }

    /// Statuses only move forward; terminal states are final. The one way back
    /// is `submitting → pending`, which hands a transient failure to the retry queue.
    pub fn can_advance_to(&self, target: &AiTaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if *self == Self::Submitting && *target == Self::Pending {
            return true;
        }
        self == target || target.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "SetNull"
    )]
    Order,

    #[sea_orm(
        belongs_to = "super::ai_provider::Entity",
        from = "Column::ProviderId",
        to = "super::ai_provider::Column::Id"
    )]
    Provider,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::ai_provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_never_left() {
        for terminal in [
            AiTaskStatus::Completed,
            AiTaskStatus::Failed,
            AiTaskStatus::Cancelled,
        ] {
            for target in [
                AiTaskStatus::Pending,
                AiTaskStatus::Submitting,
                AiTaskStatus::Polling,
                AiTaskStatus::Completed,
                AiTaskStatus::Failed,
            ] {
                assert!(!terminal.can_advance_to(&target));
            }
        }
    }

    #[test]
    fn statuses_never_regress() {
        assert!(AiTaskStatus::Pending.can_advance_to(&AiTaskStatus::Submitting));
        assert!(AiTaskStatus::Submitting.can_advance_to(&AiTaskStatus::Completed));
        assert!(AiTaskStatus::Submitted.can_advance_to(&AiTaskStatus::Polling));
        assert!(AiTaskStatus::Polling.can_advance_to(&AiTaskStatus::Polling));
        assert!(!AiTaskStatus::Polling.can_advance_to(&AiTaskStatus::Submitted));
        assert!(!AiTaskStatus::Submitted.can_advance_to(&AiTaskStatus::Pending));
        assert!(!AiTaskStatus::Polling.can_advance_to(&AiTaskStatus::Submitting));
    }

    #[test]
    fn a_submit_claim_can_be_released() {
        assert!(AiTaskStatus::Submitting.can_advance_to(&AiTaskStatus::Pending));
        assert!(AiTaskStatus::Submitting.can_advance_to(&AiTaskStatus::Submitted));
    }
}
