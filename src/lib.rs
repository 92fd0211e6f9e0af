//! TalkToData - natural-language analytics over BigQuery

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;

// Re-export main types for convenience
pub use crate::api::routes::{create_router, AppState};
pub use crate::config::Config;
pub use crate::pipeline::{QueryOutcome, QueryPipeline};
pub use crate::storage::db::init_db;
pub use crate::storage::repository::{Repository, SeaOrmRepository};
