//! SeaORM entities, one module per table.

pub mod api_keys;
pub mod api_usage;
pub mod conversations;
pub mod error_logs;
pub mod global_instructions;
pub mod messages;
pub mod project_instructions;
pub mod project_memory;
pub mod projects;
pub mod query_logs;
pub mod users;
