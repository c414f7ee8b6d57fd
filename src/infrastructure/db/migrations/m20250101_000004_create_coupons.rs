use sea_orm::{
    DbErr, DeriveIden, DeriveMigrationName,
    prelude::Expr,
    sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table},
};
use sea_orm_migration::{MigrationTrait, SchemaManager, async_trait::async_trait};

use super::m20250101_000002_create_orders::Orders;

#[derive(DeriveIden)]
pub enum Coupons {
    Table,
    Id,
    Code,
    DiscountType,
    Value,
    CreatorType,
    CustomerPhone,
    Status,
    ExpiresAt,
    CreatedAt,
    Version,
}

#[derive(DeriveIden)]
pub enum CouponUsages {
    Table,
    Id,
    CouponId,
    OrderId,
    DiscountCents,
    UsedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Coupons::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Coupons::Code)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Coupons::DiscountType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Coupons::Value).big_integer().not_null())
                    .col(
                        ColumnDef::new(Coupons::CreatorType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Coupons::CustomerPhone).string_len(32))
                    .col(
                        ColumnDef::new(Coupons::Status)
                            .string_len(16)
                            .not_null()
                            .default("unused"),
                    )
                    .col(ColumnDef::new(Coupons::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Coupons::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Coupons::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CouponUsages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CouponUsages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CouponUsages::CouponId).integer().not_null())
                    .col(ColumnDef::new(CouponUsages::OrderId).integer().not_null())
                    .col(
                        ColumnDef::new(CouponUsages::DiscountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CouponUsages::UsedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_usages_coupon")
                            .from(CouponUsages::Table, CouponUsages::CouponId)
                            .to(Coupons::Table, Coupons::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_usages_order")
                            .from(CouponUsages::Table, CouponUsages::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_coupon_usages_coupon_order")
                    .table(CouponUsages::Table)
                    .col(CouponUsages::CouponId)
                    .col(CouponUsages::OrderId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CouponUsages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Coupons::Table).to_owned())
            .await
    }
}
