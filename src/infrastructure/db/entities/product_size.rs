use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Maps a retail size onto the print house's product.
#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "product_sizes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub size_name: String,

    pub printer_product_id: String,

    pub printer_product_name: String,

    pub width_cm: f64,

    pub height_cm: f64,

    pub dpi: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
