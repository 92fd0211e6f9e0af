use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApiUsage::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ApiUsage::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ApiUsage::UserId).uuid().null())
                    .col(ColumnDef::new(ApiUsage::Endpoint).string_len(255).not_null())
                    .col(ColumnDef::new(ApiUsage::Method).string_len(10).not_null())
                    .col(ColumnDef::new(ApiUsage::StatusCode).integer().not_null())
                    .col(ColumnDef::new(ApiUsage::ResponseTimeMs).integer().not_null())
                    .col(ColumnDef::new(ApiUsage::TokensUsed).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(ApiUsage::BigqueryBytes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ApiUsage::AuthType).string_len(20).null())
                    .col(ColumnDef::new(ApiUsage::ApiKeyId).uuid().null())
                    .col(ColumnDef::new(ApiUsage::IpAddress).string_len(64).null())
                    .col(ColumnDef::new(ApiUsage::UserAgent).text().null())
                    .col(ColumnDef::new(ApiUsage::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_usage_created_at")
                    .table(ApiUsage::Table)
                    .col(ApiUsage::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_usage_endpoint")
                    .table(ApiUsage::Table)
                    .col(ApiUsage::Endpoint)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ErrorLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ErrorLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ErrorLogs::UserId).uuid().null())
                    .col(ColumnDef::new(ErrorLogs::ProjectId).uuid().null())
                    .col(ColumnDef::new(ErrorLogs::ErrorType).string_len(100).not_null())
                    .col(ColumnDef::new(ErrorLogs::ErrorMessage).text().not_null())
                    .col(ColumnDef::new(ErrorLogs::Endpoint).string_len(255).null())
                    .col(ColumnDef::new(ErrorLogs::RequestPayload).json().null())
                    .col(ColumnDef::new(ErrorLogs::Severity).string_len(20).not_null())
                    .col(ColumnDef::new(ErrorLogs::Resolved).boolean().not_null().default(false))
                    .col(ColumnDef::new(ErrorLogs::ResolvedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(ErrorLogs::ResolvedBy).uuid().null())
                    .col(ColumnDef::new(ErrorLogs::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_error_logs_severity_resolved")
                    .table(ErrorLogs::Table)
                    .col(ErrorLogs::Severity)
                    .col(ErrorLogs::Resolved)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ErrorLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApiUsage::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ApiUsage {
    Table,
    Id,
    UserId,
    Endpoint,
    Method,
    StatusCode,
    ResponseTimeMs,
    TokensUsed,
    BigqueryBytes,
    AuthType,
    ApiKeyId,
    IpAddress,
    UserAgent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ErrorLogs {
    Table,
    Id,
    UserId,
    ProjectId,
    ErrorType,
    ErrorMessage,
    Endpoint,
    RequestPayload,
    Severity,
    Resolved,
    ResolvedAt,
    ResolvedBy,
    CreatedAt,
}
