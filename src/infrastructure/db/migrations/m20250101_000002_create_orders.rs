use sea_orm::{
    DbErr, DeriveIden, DeriveMigrationName,
    prelude::Expr,
    sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table},
};
use sea_orm_migration::{MigrationTrait, SchemaManager, async_trait::async_trait};

use super::m20250101_000001_create_franchisees::Franchisees;

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    OrderNumber,
    ProductCategory,
    CustomerName,
    CustomerPhone,
    CustomerAddress,
    LogisticsInfo,
    Size,
    StyleName,
    ProductName,
    ProductType,
    PriceCents,
    CommissionCents,
    FranchiseeId,
    PromotionCode,
    ReferrerUserId,
    SourceType,
    Openid,
    TransactionId,
    PaidAmountCents,
    CouponCode,
    Status,
    PrinterSendStatus,
    NeedConfirmation,
    FranchiseeConfirmed,
    SkippedProduction,
    HasFailedTask,
    AiLastError,
    NeedsManualReview,
    ManualReviewReason,
    PrinterErrorMessage,
    CancelRequestedAt,
    CancelReason,
    RefundKey,
    SelectionExtraCents,
    SelectionExtraPaid,
    OriginalImage,
    FinalImage,
    FinalImageClean,
    HdImage,
    HdImageClean,
    CreatedAt,
    UpdatedAt,
    PaymentTime,
    ShootingCompletedAt,
    RetouchCompletedAt,
    ConfirmationDeadline,
    FranchiseeConfirmedAt,
    CompletedAt,
    ShippedAt,
    CancelledAt,
    RefundedAt,
    Version,
}

#[derive(DeriveIden)]
pub enum OrderImages {
    Table,
    Id,
    OrderId,
    ImagePath,
    Kind,
    IsMain,
    IsSelected,
    SourceTaskId,
    SortOrder,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum OrderEvents {
    Table,
    Id,
    OrderId,
    OrderNumber,
    FromStatus,
    ToStatus,
    Trigger,
    Actor,
    At,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn timestamp(column: Orders) -> ColumnDef {
    ColumnDef::new(column).timestamp_with_time_zone().to_owned()
}

fn flag(column: Orders) -> ColumnDef {
    ColumnDef::new(column)
        .boolean()
        .not_null()
        .default(false)
        .to_owned()
}

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::OrderNumber).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Orders::ProductCategory)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Orders::CustomerName).string_len(100).not_null())
                    .col(ColumnDef::new(Orders::CustomerPhone).string_len(32).not_null())
                    .col(ColumnDef::new(Orders::CustomerAddress).text())
                    .col(ColumnDef::new(Orders::LogisticsInfo).json())
                    .col(ColumnDef::new(Orders::Size).string_len(32))
                    .col(ColumnDef::new(Orders::StyleName).string_len(64))
                    .col(ColumnDef::new(Orders::ProductName).string_len(100))
                    .col(ColumnDef::new(Orders::ProductType).string_len(32))
                    .col(
                        ColumnDef::new(Orders::PriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Orders::CommissionCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Orders::FranchiseeId).integer())
                    .col(ColumnDef::new(Orders::PromotionCode).string_len(64))
                    .col(ColumnDef::new(Orders::ReferrerUserId).integer())
                    .col(
                        ColumnDef::new(Orders::SourceType)
                            .string_len(16)
                            .not_null()
                            .default("website"),
                    )
                    .col(ColumnDef::new(Orders::Openid).string_len(64))
                    .col(ColumnDef::new(Orders::TransactionId).string_len(64))
                    .col(ColumnDef::new(Orders::PaidAmountCents).big_integer())
                    .col(ColumnDef::new(Orders::CouponCode).string_len(64))
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string_len(32)
                            .not_null()
                            .default("unpaid"),
                    )
                    .col(
                        ColumnDef::new(Orders::PrinterSendStatus)
                            .string_len(32)
                            .not_null()
                            .default("not_sent"),
                    )
                    .col(flag(Orders::NeedConfirmation))
                    .col(flag(Orders::FranchiseeConfirmed))
                    .col(flag(Orders::SkippedProduction))
                    .col(flag(Orders::HasFailedTask))
                    .col(ColumnDef::new(Orders::AiLastError).text())
                    .col(flag(Orders::NeedsManualReview))
                    .col(ColumnDef::new(Orders::ManualReviewReason).text())
                    .col(ColumnDef::new(Orders::PrinterErrorMessage).text())
                    .col(timestamp(Orders::CancelRequestedAt))
                    .col(ColumnDef::new(Orders::CancelReason).text())
                    .col(ColumnDef::new(Orders::RefundKey).string_len(128))
                    .col(
                        ColumnDef::new(Orders::SelectionExtraCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(flag(Orders::SelectionExtraPaid))
                    .col(ColumnDef::new(Orders::OriginalImage).string_len(512))
                    .col(ColumnDef::new(Orders::FinalImage).string_len(512))
                    .col(ColumnDef::new(Orders::FinalImageClean).string_len(512))
                    .col(ColumnDef::new(Orders::HdImage).string_len(512))
                    .col(ColumnDef::new(Orders::HdImageClean).string_len(512))
                    .col(
                        timestamp(Orders::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp(Orders::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp(Orders::PaymentTime))
                    .col(timestamp(Orders::ShootingCompletedAt))
                    .col(timestamp(Orders::RetouchCompletedAt))
                    .col(timestamp(Orders::ConfirmationDeadline))
                    .col(timestamp(Orders::FranchiseeConfirmedAt))
                    .col(timestamp(Orders::CompletedAt))
                    .col(timestamp(Orders::ShippedAt))
                    .col(timestamp(Orders::CancelledAt))
                    .col(timestamp(Orders::RefundedAt))
                    .col(
                        ColumnDef::new(Orders::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_franchisee")
                            .from(Orders::Table, Orders::FranchiseeId)
                            .to(Franchisees::Table, Franchisees::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_orders_number_category")
                    .table(Orders::Table)
                    .col(Orders::OrderNumber)
                    .col(Orders::ProductCategory)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_status")
                    .table(Orders::Table)
                    .col(Orders::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_franchisee_id")
                    .table(Orders::Table)
                    .col(Orders::FranchiseeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderImages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderImages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderImages::OrderId).integer().not_null())
                    .col(
                        ColumnDef::new(OrderImages::ImagePath)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderImages::Kind).string_len(16).not_null())
                    .col(
                        ColumnDef::new(OrderImages::IsMain)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OrderImages::IsSelected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(OrderImages::SourceTaskId).uuid())
                    .col(
                        ColumnDef::new(OrderImages::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(OrderImages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_images_order")
                            .from(OrderImages::Table, OrderImages::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_images_order_id")
                    .table(OrderImages::Table)
                    .col(OrderImages::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_order_images_order_task")
                    .table(OrderImages::Table)
                    .col(OrderImages::OrderId)
                    .col(OrderImages::SourceTaskId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderEvents::OrderId).integer().not_null())
                    .col(
                        ColumnDef::new(OrderEvents::OrderNumber)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderEvents::FromStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderEvents::ToStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderEvents::Trigger).string_len(64).not_null())
                    .col(ColumnDef::new(OrderEvents::Actor).string_len(64).not_null())
                    .col(
                        ColumnDef::new(OrderEvents::At)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_events_order_id")
                    .table(OrderEvents::Table)
                    .col(OrderEvents::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderImages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}
