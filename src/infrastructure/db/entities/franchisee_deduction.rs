use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "franchisee_deductions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub franchisee_id: i32,

    pub order_id: i32,

    pub amount_cents: i64,

    #[sea_orm(unique)]
    pub idempotency_key: String,

    pub reason: String,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::franchisee::Entity",
        from = "Column::FranchiseeId",
        to = "super::franchisee::Column::Id",
        on_delete = "Cascade"
    )]
    Franchisee,
}

impl Related<super::franchisee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Franchisee.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
