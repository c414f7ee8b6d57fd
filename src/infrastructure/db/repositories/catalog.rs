use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::{
    error::Result,
    infrastructure::db::entities::{Product, ProductSize, product, product_size},
};

/// Read-only access to the product catalog maintained by the CRUD layer.
pub struct CatalogRepository;

impl CatalogRepository {
    pub async fn product_by_name<C: ConnectionTrait>(
        db_connection: &C,
        name: &str,
    ) -> Result<Option<product::Model>> {
        Ok(Product::find()
            .filter(product::Column::Name.eq(name))
            .one(db_connection)
            .await?)
    }

    pub async fn size_by_name<C: ConnectionTrait>(
        db_connection: &C,
        size_name: &str,
    ) -> Result<Option<product_size::Model>> {
        Ok(ProductSize::find()
            .filter(product_size::Column::SizeName.eq(size_name))
            .one(db_connection)
            .await?)
    }
}
