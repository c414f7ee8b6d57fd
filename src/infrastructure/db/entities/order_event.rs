use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One accepted order transition. Rows are only ever inserted.
#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "order_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub order_id: i32,

    pub order_number: String,

    pub from_status: String,

    pub to_status: String,

    pub trigger: String,

    pub actor: String,

    pub at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
