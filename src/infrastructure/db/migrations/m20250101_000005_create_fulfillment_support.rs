use sea_orm::{
    DbErr, DeriveIden, DeriveMigrationName,
    prelude::Expr,
    sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table},
};
use sea_orm_migration::{MigrationTrait, SchemaManager, async_trait::async_trait};

use super::m20250101_000002_create_orders::Orders;

#[derive(DeriveIden)]
pub enum PrinterDispatches {
    Table,
    Id,
    OrderId,
    ExternalKey,
    AttemptCount,
    LastAttemptAt,
    NextRetryAt,
    SucceededAt,
    LastError,
    ResponseData,
    CancelForwardedAt,
    CancelAcknowledgedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum SelectionTokens {
    Table,
    Jti,
    OrderId,
    Purpose,
    IssuedAt,
    ExpiresAt,
    ConsumedAt,
    RevokedAt,
    Result,
}

#[derive(DeriveIden)]
pub enum Products {
    Table,
    Id,
    Name,
    FreeSelectionCount,
    ExtraPhotoPriceCents,
}

#[derive(DeriveIden)]
pub enum ProductSizes {
    Table,
    Id,
    SizeName,
    PrinterProductId,
    PrinterProductName,
    WidthCm,
    HeightCm,
    Dpi,
}

#[derive(DeriveIden)]
pub enum SystemConfigs {
    Table,
    ConfigKey,
    ConfigValue,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PrinterDispatches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PrinterDispatches::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PrinterDispatches::OrderId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PrinterDispatches::ExternalKey)
                            .string_len(96)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PrinterDispatches::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PrinterDispatches::LastAttemptAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(PrinterDispatches::NextRetryAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PrinterDispatches::SucceededAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PrinterDispatches::LastError).text())
                    .col(ColumnDef::new(PrinterDispatches::ResponseData).json())
                    .col(
                        ColumnDef::new(PrinterDispatches::CancelForwardedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(PrinterDispatches::CancelAcknowledgedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(PrinterDispatches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PrinterDispatches::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_printer_dispatches_order")
                            .from(PrinterDispatches::Table, PrinterDispatches::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SelectionTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SelectionTokens::Jti)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SelectionTokens::OrderId).integer().not_null())
                    .col(
                        ColumnDef::new(SelectionTokens::Purpose)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SelectionTokens::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SelectionTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SelectionTokens::ConsumedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SelectionTokens::RevokedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SelectionTokens::Result).json())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_selection_tokens_order")
                            .from(SelectionTokens::Table, SelectionTokens::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_selection_tokens_order_id")
                    .table(SelectionTokens::Table)
                    .col(SelectionTokens::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Products::Name)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Products::FreeSelectionCount)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Products::ExtraPhotoPriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProductSizes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductSizes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProductSizes::SizeName)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ProductSizes::PrinterProductId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductSizes::PrinterProductName)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductSizes::WidthCm).double().not_null())
                    .col(ColumnDef::new(ProductSizes::HeightCm).double().not_null())
                    .col(
                        ColumnDef::new(ProductSizes::Dpi)
                            .integer()
                            .not_null()
                            .default(300),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SystemConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemConfigs::ConfigKey)
                            .string_len(128)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SystemConfigs::ConfigValue).text().not_null())
                    .col(
                        ColumnDef::new(SystemConfigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Table::drop().table(SystemConfigs::Table).to_owned(),
            Table::drop().table(ProductSizes::Table).to_owned(),
            Table::drop().table(Products::Table).to_owned(),
            Table::drop().table(SelectionTokens::Table).to_owned(),
            Table::drop().table(PrinterDispatches::Table).to_owned(),
        ] {
            manager.drop_table(table).await?;
        }

        Ok(())
    }
}
