use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QueryLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(QueryLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(QueryLogs::UserId).uuid().null())
                    .col(ColumnDef::new(QueryLogs::ProjectId).uuid().null())
                    .col(ColumnDef::new(QueryLogs::ConversationId).uuid().null())
                    .col(ColumnDef::new(QueryLogs::UserQuestion).text().not_null())
                    .col(ColumnDef::new(QueryLogs::GeneratedSql).text().null())
                    .col(ColumnDef::new(QueryLogs::SqlGenerationTimeMs).integer().null())
                    .col(ColumnDef::new(QueryLogs::SqlTokensUsed).integer().null())
                    .col(ColumnDef::new(QueryLogs::ExecutionStatus).string_len(20).null())
                    .col(ColumnDef::new(QueryLogs::ExecutionTimeMs).integer().null())
                    .col(ColumnDef::new(QueryLogs::RowsReturned).integer().null())
                    .col(ColumnDef::new(QueryLogs::BytesProcessed).big_integer().null())
                    .col(ColumnDef::new(QueryLogs::ErrorMessage).text().null())
                    .col(ColumnDef::new(QueryLogs::ErrorType).string_len(100).null())
                    .col(ColumnDef::new(QueryLogs::ModelUsed).string_len(100).null())
                    .col(ColumnDef::new(QueryLogs::IpAddress).string_len(64).null())
                    .col(ColumnDef::new(QueryLogs::UserAgent).text().null())
                    .col(ColumnDef::new(QueryLogs::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_query_log_user")
                            .from(QueryLogs::Table, QueryLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_query_log_project")
                            .from(QueryLogs::Table, QueryLogs::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_query_log_conversation")
                            .from(QueryLogs::Table, QueryLogs::ConversationId)
                            .to(Conversations::Table, Conversations::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_query_logs_created_at")
                    .table(QueryLogs::Table)
                    .col(QueryLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_query_logs_user_project")
                    .table(QueryLogs::Table)
                    .col(QueryLogs::UserId)
                    .col(QueryLogs::ProjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueryLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum QueryLogs {
    Table,
    Id,
    UserId,
    ProjectId,
    ConversationId,
    UserQuestion,
    GeneratedSql,
    SqlGenerationTimeMs,
    SqlTokensUsed,
    ExecutionStatus,
    ExecutionTimeMs,
    RowsReturned,
    BytesProcessed,
    ErrorMessage,
    ErrorType,
    ModelUsed,
    IpAddress,
    UserAgent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Conversations {
    Table,
    Id,
}
