pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users;
mod m20250101_000002_create_projects;
mod m20250101_000003_create_conversations;
mod m20250101_000004_create_memory;
mod m20250101_000005_create_query_logs;
mod m20250101_000006_create_api_keys;
mod m20250101_000007_create_audit_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users::Migration),
            Box::new(m20250101_000002_create_projects::Migration),
            Box::new(m20250101_000003_create_conversations::Migration),
            Box::new(m20250101_000004_create_memory::Migration),
            Box::new(m20250101_000005_create_query_logs::Migration),
            Box::new(m20250101_000006_create_api_keys::Migration),
            Box::new(m20250101_000007_create_audit_tables::Migration),
        ]
    }
}
