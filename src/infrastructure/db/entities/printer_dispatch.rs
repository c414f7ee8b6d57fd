use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Delivery record for one order row, keyed by its external key.
#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "printer_dispatches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub order_id: i32,

    #[sea_orm(unique)]
    pub external_key: String,

    pub attempt_count: i32,

    #[sea_orm(nullable)]
    pub last_attempt_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub next_retry_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub succeeded_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub last_error: Option<String>,

    #[sea_orm(nullable)]
    pub response_data: Option<Json>,

    #[sea_orm(nullable)]
    pub cancel_forwarded_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub cancel_acknowledged_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
