use sea_orm::{
    DbErr, DeriveIden, DeriveMigrationName,
    prelude::Expr,
    sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table},
};
use sea_orm_migration::{MigrationTrait, SchemaManager, async_trait::async_trait};

use super::m20250101_000002_create_orders::Orders;

#[derive(DeriveIden)]
pub enum AiProviders {
    Table,
    Id,
    Name,
    Kind,
    Mode,
    BaseUrl,
    SubmitPath,
    PollPath,
    CancelPath,
    ApiKey,
    CallbackSecret,
    ModelName,
    MaxRetries,
    TaskTimeoutSecs,
    PollBaseSecs,
    PollCapSecs,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum AiTasks {
    Table,
    Id,
    OrderId,
    StyleCategoryId,
    StyleImageId,
    ProviderId,
    InputImagePath,
    Prompt,
    Params,
    ResultImagePath,
    ProviderJobId,
    Status,
    AttemptCount,
    LastError,
    CancelRequested,
    SupersededBy,
    NextAttemptAt,
    CreatedAt,
    SubmittedAt,
    PolledAt,
    FinishedAt,
    Version,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AiProviders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AiProviders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AiProviders::Name)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AiProviders::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(AiProviders::Mode).string_len(16).not_null())
                    .col(ColumnDef::new(AiProviders::BaseUrl).string_len(512).not_null())
                    .col(
                        ColumnDef::new(AiProviders::SubmitPath)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiProviders::PollPath)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AiProviders::CancelPath).string_len(256))
                    .col(ColumnDef::new(AiProviders::ApiKey).text().not_null())
                    .col(ColumnDef::new(AiProviders::CallbackSecret).text())
                    .col(
                        ColumnDef::new(AiProviders::ModelName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiProviders::MaxRetries)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(AiProviders::TaskTimeoutSecs)
                            .big_integer()
                            .not_null()
                            .default(600),
                    )
                    .col(
                        ColumnDef::new(AiProviders::PollBaseSecs)
                            .big_integer()
                            .not_null()
                            .default(5),
                    )
                    .col(
                        ColumnDef::new(AiProviders::PollCapSecs)
                            .big_integer()
                            .not_null()
                            .default(60),
                    )
                    .col(
                        ColumnDef::new(AiProviders::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AiProviders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AiTasks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AiTasks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AiTasks::OrderId).integer())
                    .col(ColumnDef::new(AiTasks::StyleCategoryId).integer())
                    .col(ColumnDef::new(AiTasks::StyleImageId).integer())
                    .col(ColumnDef::new(AiTasks::ProviderId).integer().not_null())
                    .col(
                        ColumnDef::new(AiTasks::InputImagePath)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AiTasks::Prompt).text().not_null())
                    .col(ColumnDef::new(AiTasks::Params).json().not_null())
                    .col(ColumnDef::new(AiTasks::ResultImagePath).string_len(512))
                    .col(ColumnDef::new(AiTasks::ProviderJobId).string_len(128))
                    .col(
                        ColumnDef::new(AiTasks::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(AiTasks::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(AiTasks::LastError).text())
                    .col(
                        ColumnDef::new(AiTasks::CancelRequested)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(AiTasks::SupersededBy).uuid())
                    .col(ColumnDef::new(AiTasks::NextAttemptAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(AiTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(AiTasks::SubmittedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AiTasks::PolledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AiTasks::FinishedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(AiTasks::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_tasks_order")
                            .from(AiTasks::Table, AiTasks::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_tasks_provider")
                            .from(AiTasks::Table, AiTasks::ProviderId)
                            .to(AiProviders::Table, AiProviders::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ai_tasks_order_id")
                    .table(AiTasks::Table)
                    .col(AiTasks::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ai_tasks_status")
                    .table(AiTasks::Table)
                    .col(AiTasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ai_tasks_provider_job_id")
                    .table(AiTasks::Table)
                    .col(AiTasks::ProviderJobId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AiTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AiProviders::Table).to_owned())
            .await
    }
}
