use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "selection_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub jti: String,

    #[sea_orm(indexed)]
    pub order_id: i32,

    pub purpose: TokenPurpose,

    pub issued_at: DateTimeUtc,

    pub expires_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub consumed_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub revoked_at: Option<DateTimeUtc>,

    /// Outcome recorded on consumption, replayed on repeat calls.
    #[sea_orm(nullable)]
    pub result: Option<Json>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    #[sea_orm(string_value = "view")]
    View,

    #[sea_orm(string_value = "pick")]
    Pick,

    #[sea_orm(string_value = "confirm")]
    Confirm,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
