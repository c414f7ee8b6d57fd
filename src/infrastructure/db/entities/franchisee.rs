use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "franchisees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub store_name: String,

    pub balance_cents: i64,

    #[sea_orm(nullable)]
    pub printer_shop_id: Option<String>,

    #[sea_orm(nullable)]
    pub printer_shop_name: Option<String>,

    #[sea_orm(nullable)]
    pub machine_serial_number: Option<String>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,

    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::franchisee_deduction::Entity")]
    FranchiseeDeduction,
}

impl Related<super::franchisee_deduction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FranchiseeDeduction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
