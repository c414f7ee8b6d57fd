use sea_orm::{
    DbErr, DeriveIden, DeriveMigrationName,
    prelude::Expr,
    sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table},
};
use sea_orm_migration::{MigrationTrait, SchemaManager, async_trait::async_trait};

#[derive(DeriveIden)]
pub enum Franchisees {
    Table,
    Id,
    StoreName,
    BalanceCents,
    PrinterShopId,
    PrinterShopName,
    MachineSerialNumber,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(DeriveIden)]
pub enum FranchiseeDeductions {
    Table,
    Id,
    FranchiseeId,
    OrderId,
    AmountCents,
    IdempotencyKey,
    Reason,
    CreatedAt,
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
                    .table(Franchisees::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Franchisees::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Franchisees::StoreName)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Franchisees::BalanceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Franchisees::PrinterShopId).string_len(64))
                    .col(ColumnDef::new(Franchisees::PrinterShopName).string_len(100))
                    .col(ColumnDef::new(Franchisees::MachineSerialNumber).string_len(64))
                    .col(
                        ColumnDef::new(Franchisees::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Franchisees::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Franchisees::Version)
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
                    .table(FranchiseeDeductions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FranchiseeDeductions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FranchiseeDeductions::FranchiseeId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FranchiseeDeductions::OrderId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FranchiseeDeductions::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FranchiseeDeductions::IdempotencyKey)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(FranchiseeDeductions::Reason)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FranchiseeDeductions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FranchiseeDeductions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_franchisee_deductions_franchisee")
                            .from(
                                FranchiseeDeductions::Table,
                                FranchiseeDeductions::FranchiseeId,
                            )
                            .to(Franchisees::Table, Franchisees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_franchisee_deductions_franchisee_id")
                    .table(FranchiseeDeductions::Table)
                    .col(FranchiseeDeductions::FranchiseeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FranchiseeDeductions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Franchisees::Table).to_owned())
            .await
    }
}
