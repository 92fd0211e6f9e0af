use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Tier 1: system-wide rules
        manager
            .create_table(
                Table::create()
                    .table(GlobalInstructions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GlobalInstructions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(GlobalInstructions::InstructionText).text().not_null())
                    .col(ColumnDef::new(GlobalInstructions::Category).string_len(100).null())
                    .col(
                        ColumnDef::new(GlobalInstructions::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GlobalInstructions::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(GlobalInstructions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GlobalInstructions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Tier 2a: business rules and domain knowledge
        manager
            .create_table(
                Table::create()
                    .table(ProjectMemory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ProjectMemory::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ProjectMemory::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(ProjectMemory::MemoryType).string_len(50).not_null())
                    .col(ColumnDef::new(ProjectMemory::Key).string_len(255).not_null())
                    .col(ColumnDef::new(ProjectMemory::Content).text().not_null())
                    .col(ColumnDef::new(ProjectMemory::CreatedBy).uuid().null())
                    .col(
                        ColumnDef::new(ProjectMemory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectMemory::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_memory_project")
                            .from(ProjectMemory::Table, ProjectMemory::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Tier 2b: project-specific agent instructions
        manager
            .create_table(
                Table::create()
                    .table(ProjectInstructions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ProjectInstructions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ProjectInstructions::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(ProjectInstructions::InstructionText).text().not_null())
                    .col(
                        ColumnDef::new(ProjectInstructions::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProjectInstructions::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ProjectInstructions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectInstructions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_instructions_project")
                            .from(ProjectInstructions::Table, ProjectInstructions::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_memory_project_id")
                    .table(ProjectMemory::Table)
                    .col(ProjectMemory::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_instructions_project_id")
                    .table(ProjectInstructions::Table)
                    .col(ProjectInstructions::ProjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectInstructions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectMemory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GlobalInstructions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GlobalInstructions {
    Table,
    Id,
    InstructionText,
    Category,
    Priority,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProjectMemory {
    Table,
    Id,
    ProjectId,
    MemoryType,
    Key,
    Content,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProjectInstructions {
    Table,
    Id,
    ProjectId,
    InstructionText,
    Priority,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
}
