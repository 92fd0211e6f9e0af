//! Persistence layer.
//!
//! Each concern gets its own store trait so handlers and the query pipeline
//! can depend on `Arc<dyn Repository>` while tests swap in a fresh in-memory
//! database per case.

mod api_keys;
mod audit;
mod conversations;
mod memory;
mod projects;
mod query_logs;
mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::models::internal::{
    ErrorLogEntry, ErrorLogFilter, InstructionChanges, MemoryItemChanges, NewApiKey,
    NewInstruction, NewMemoryItem, NewProject, PlatformStats, ProjectChanges, QueryLogEntry,
    QueryLogFilter, SchemaCache, UsageEntry, UserChanges,
};
use crate::models::{
    ApiKey, ApiUsage, Conversation, ErrorLog, GlobalInstruction, Message, Project,
    ProjectInstruction, ProjectMemoryItem, QueryLog, User,
};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DbError(#[from] sea_orm::DbErr),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<String>,
        is_superuser: bool,
    ) -> Result<User, RepositoryError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, RepositoryError>;
    async fn count_users(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(
        &self,
        owner_id: Uuid,
        project: NewProject,
    ) -> Result<Project, RepositoryError>;
    async fn list_projects(&self, owner_id: Uuid) -> Result<Vec<Project>, RepositoryError>;
    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, RepositoryError>;
    /// Returns the project only when `owner_id` owns it.
    async fn find_owned_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Project>, RepositoryError>;
    async fn update_project(
        &self,
        id: Uuid,
        changes: ProjectChanges,
    ) -> Result<Project, RepositoryError>;
    /// Removes the project and everything scoped to it.
    async fn delete_project(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// Stores credentials and the freshly extracted schema in one write.
    async fn save_connection(
        &self,
        id: Uuid,
        credentials_json: &str,
        schema: &SchemaCache,
    ) -> Result<Project, RepositoryError>;
    async fn save_schema(&self, id: Uuid, schema: &SchemaCache)
        -> Result<Project, RepositoryError>;
    async fn count_projects(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    // Tier 1
    async fn create_global_instruction(
        &self,
        instruction: NewInstruction,
    ) -> Result<GlobalInstruction, RepositoryError>;
    async fn list_global_instructions(
        &self,
        active_only: bool,
    ) -> Result<Vec<GlobalInstruction>, RepositoryError>;
    async fn update_global_instruction(
        &self,
        id: Uuid,
        changes: InstructionChanges,
    ) -> Result<GlobalInstruction, RepositoryError>;
    async fn delete_global_instruction(&self, id: Uuid) -> Result<(), RepositoryError>;

    // Tier 2
    async fn create_memory_item(
        &self,
        project_id: Uuid,
        item: NewMemoryItem,
    ) -> Result<ProjectMemoryItem, RepositoryError>;
    async fn list_memory_items(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMemoryItem>, RepositoryError>;
    async fn update_memory_item(
        &self,
        project_id: Uuid,
        id: Uuid,
        changes: MemoryItemChanges,
    ) -> Result<ProjectMemoryItem, RepositoryError>;
    async fn delete_memory_item(&self, project_id: Uuid, id: Uuid)
        -> Result<(), RepositoryError>;

    async fn create_project_instruction(
        &self,
        project_id: Uuid,
        instruction: NewInstruction,
    ) -> Result<ProjectInstruction, RepositoryError>;
    async fn list_project_instructions(
        &self,
        project_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<ProjectInstruction>, RepositoryError>;
    async fn update_project_instruction(
        &self,
        project_id: Uuid,
        id: Uuid,
        changes: InstructionChanges,
    ) -> Result<ProjectInstruction, RepositoryError>;
    async fn delete_project_instruction(
        &self,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        title: Option<String>,
    ) -> Result<Conversation, RepositoryError>;
    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, RepositoryError>;
    /// Conversations of one user in one project, most recently active first.
    async fn list_conversations(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Conversation>, RepositoryError>;
    async fn delete_conversation(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// All messages in chronological order.
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, RepositoryError>;
    /// The last `limit` messages, still in chronological order.
    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Message>, RepositoryError>;
    /// Appends a user/assistant pair, titles an untitled conversation and
    /// bumps `updated_at`, all in one transaction.
    async fn append_exchange(
        &self,
        conversation_id: Uuid,
        question: &str,
        answer: &str,
        answer_tokens: i32,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QueryLogStore: Send + Sync {
    async fn insert_query_log(&self, entry: QueryLogEntry) -> Result<QueryLog, RepositoryError>;
    /// Stores a successful query log and, when it names a conversation, the
    /// question/`reply` exchange. Either both are written or neither is.
    async fn record_answered_query(
        &self,
        entry: QueryLogEntry,
        reply: &str,
    ) -> Result<QueryLog, RepositoryError>;
    /// Newest first, with the unpaginated total.
    async fn list_query_logs(
        &self,
        filter: QueryLogFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<QueryLog>, u64), RepositoryError>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn create_api_key(&self, key: NewApiKey) -> Result<ApiKey, RepositoryError>;
    async fn find_api_keys_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, RepositoryError>;
    async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>, RepositoryError>;
    async fn deactivate_api_key(&self, user_id: Uuid, id: Uuid) -> Result<(), RepositoryError>;
    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_usage(&self, entry: UsageEntry) -> Result<(), RepositoryError>;
    async fn list_usage(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<ApiUsage>, u64), RepositoryError>;
    async fn insert_error_log(&self, entry: ErrorLogEntry) -> Result<ErrorLog, RepositoryError>;
    async fn list_error_logs(
        &self,
        filter: ErrorLogFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<ErrorLog>, u64), RepositoryError>;
    async fn resolve_error_log(
        &self,
        id: Uuid,
        resolved_by: Uuid,
    ) -> Result<ErrorLog, RepositoryError>;
    async fn platform_stats(&self) -> Result<PlatformStats, RepositoryError>;
}

/// Everything the service needs from storage.
pub trait Repository:
    UserStore + ProjectStore + MemoryStore + ConversationStore + QueryLogStore + ApiKeyStore + AuditStore
{
    fn get_db(&self) -> &DatabaseConnection;
}

pub struct SeaOrmRepository {
    db: DatabaseConnection,
}

impl SeaOrmRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl Repository for SeaOrmRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `DbError`.
pub(crate) fn map_unique(err: sea_orm::DbErr, what: &str) -> RepositoryError {
    match err.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            RepositoryError::Conflict(what.to_string())
        }
        _ => RepositoryError::DbError(err),
    }
}
