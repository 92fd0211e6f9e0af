use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::internal::PlatformStats;
use crate::models::{
    ApiKey, ApiUsage, Conversation, ErrorLog, GlobalInstruction, Message, Project,
    ProjectInstruction, ProjectMemoryItem, QueryLog, User,
};

pub const MEMORY_TYPES: [&str; 3] = ["business_rule", "calculation", "domain_knowledge"];

fn validate_memory_type(value: &str) -> Result<(), validator::ValidationError> {
    if MEMORY_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("memory_type")
            .with_message("must be business_rule, calculation or domain_knowledge".into()))
    }
}

// ==================== AUTH ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub preferences: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    #[schema(value_type = Object)]
    pub preferences: Value,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            preferences: user.preferences,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[validate(range(min = 1, max = 3650))]
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub scopes: Vec<String>,
    pub rate_limit_per_minute: i32,
    pub rate_limit_per_day: i32,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            key_prefix: key.key_prefix,
            scopes: serde_json::from_value(key.scopes).unwrap_or_default(),
            rate_limit_per_minute: key.rate_limit_per_minute,
            rate_limit_per_day: key.rate_limit_per_day,
            is_active: key.is_active,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
            created_at: key.created_at,
        }
    }
}

/// Returned once at creation; the plaintext key is not stored.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedApiKeyResponse {
    pub key: String,
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
}

// ==================== PROJECTS ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub bigquery_project_id: Option<String>,
    pub bigquery_dataset: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub bigquery_project_id: Option<String>,
    pub bigquery_dataset: Option<String>,
}

/// Project as the API shows it; credentials are never included.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub bigquery_project_id: Option<String>,
    pub bigquery_dataset: Option<String>,
    pub bigquery_connected: bool,
    pub schema_last_updated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            owner_id: project.owner_id,
            name: project.name,
            description: project.description,
            bigquery_project_id: project.bigquery_project_id,
            bigquery_dataset: project.bigquery_dataset,
            bigquery_connected: project.credentials_json.is_some(),
            schema_last_updated: project.schema_last_updated,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BigQueryCredentialsRequest {
    /// Service account key JSON, as a string
    #[validate(length(min = 1))]
    pub credentials_json: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectResponse {
    pub status: String,
    pub tables_found: usize,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshSchemaResponse {
    pub status: String,
    pub tables_found: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateSqlRequest {
    #[validate(length(min = 1))]
    pub sql: String,
}

// ==================== MEMORY ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGlobalInstructionRequest {
    #[validate(length(min = 1))]
    pub instruction_text: String,
    pub category: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateGlobalInstructionRequest {
    #[validate(length(min = 1))]
    pub instruction_text: Option<String>,
    pub category: Option<String>,
    pub priority: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GlobalInstructionResponse {
    pub id: Uuid,
    pub instruction_text: String,
    pub category: Option<String>,
    pub priority: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<GlobalInstruction> for GlobalInstructionResponse {
    fn from(inst: GlobalInstruction) -> Self {
        Self {
            id: inst.id,
            instruction_text: inst.instruction_text,
            category: inst.category,
            priority: inst.priority,
            active: inst.active,
            created_at: inst.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMemoryRequest {
    #[validate(custom(function = "validate_memory_type"))]
    pub memory_type: String,
    #[validate(length(min = 1, max = 255))]
    pub key: String,
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMemoryRequest {
    #[validate(custom(function = "validate_memory_type"))]
    pub memory_type: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub key: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemoryResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub memory_type: String,
    pub key: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ProjectMemoryItem> for MemoryResponse {
    fn from(item: ProjectMemoryItem) -> Self {
        Self {
            id: item.id,
            project_id: item.project_id,
            memory_type: item.memory_type,
            key: item.key,
            content: item.content,
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectInstructionRequest {
    #[validate(length(min = 1))]
    pub instruction_text: String,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectInstructionRequest {
    #[validate(length(min = 1))]
    pub instruction_text: Option<String>,
    pub priority: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectInstructionResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub instruction_text: String,
    pub priority: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ProjectInstruction> for ProjectInstructionResponse {
    fn from(inst: ProjectInstruction) -> Self {
        Self {
            id: inst.id,
            project_id: inst.project_id,
            instruction_text: inst.instruction_text,
            priority: inst.priority,
            active: inst.active,
            created_at: inst.created_at,
        }
    }
}

// ==================== CONVERSATIONS ====================

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conv: Conversation) -> Self {
        Self {
            id: conv.id,
            project_id: conv.project_id,
            title: conv.title,
            created_at: conv.created_at,
            updated_at: conv.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub tokens_used: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(msg: Message) -> Self {
        Self {
            id: msg.id,
            role: msg.role,
            content: msg.content,
            tokens_used: msg.tokens_used,
            created_at: msg.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationDetailResponse {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    pub messages: Vec<MessageResponse>,
}

// ==================== QUERIES ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AskRequest {
    pub project_id: Uuid,
    #[validate(length(min = 1))]
    pub question: String,
    pub conversation_id: Option<Uuid>,
    /// Defaults to the configured model
    pub model: Option<String>,
    /// Accepted for compatibility; responses are never streamed
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExecuteSqlRequest {
    pub project_id: Uuid,
    #[validate(length(min = 1))]
    pub sql: String,
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    pub project_id: Option<Uuid>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryLogResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub user_question: String,
    pub generated_sql: Option<String>,
    pub sql_generation_time_ms: Option<i32>,
    pub sql_tokens_used: Option<i32>,
    pub execution_status: Option<String>,
    pub execution_time_ms: Option<i32>,
    pub rows_returned: Option<i32>,
    pub bytes_processed: Option<i64>,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub model_used: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<QueryLog> for QueryLogResponse {
    fn from(log: QueryLog) -> Self {
        Self {
            id: log.id,
            user_id: log.user_id,
            project_id: log.project_id,
            conversation_id: log.conversation_id,
            user_question: log.user_question,
            generated_sql: log.generated_sql,
            sql_generation_time_ms: log.sql_generation_time_ms,
            sql_tokens_used: log.sql_tokens_used,
            execution_status: log.execution_status,
            execution_time_ms: log.execution_time_ms,
            rows_returned: log.rows_returned,
            bytes_processed: log.bytes_processed,
            error_message: log.error_message,
            error_type: log.error_type,
            model_used: log.model_used,
            ip_address: log.ip_address,
            user_agent: log.user_agent,
            created_at: log.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryLogPage {
    pub total: u64,
    pub logs: Vec<QueryLogResponse>,
}

// ==================== ADMIN ====================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueryLogParams {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ErrorLogParams {
    pub resolved: Option<bool>,
    pub severity: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorLogResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub error_type: String,
    pub error_message: String,
    pub endpoint: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub request_payload: Option<Value>,
    pub severity: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ErrorLog> for ErrorLogResponse {
    fn from(log: ErrorLog) -> Self {
        Self {
            id: log.id,
            user_id: log.user_id,
            project_id: log.project_id,
            error_type: log.error_type,
            error_message: log.error_message,
            endpoint: log.endpoint,
            request_payload: log.request_payload,
            severity: log.severity,
            resolved: log.resolved,
            resolved_at: log.resolved_at,
            resolved_by: log.resolved_by,
            created_at: log.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorLogPage {
    pub total: u64,
    pub logs: Vec<ErrorLogResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: i32,
    pub tokens_used: i32,
    pub bigquery_bytes: i64,
    pub auth_type: Option<String>,
    pub api_key_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiUsage> for UsageResponse {
    fn from(usage: ApiUsage) -> Self {
        Self {
            id: usage.id,
            user_id: usage.user_id,
            endpoint: usage.endpoint,
            method: usage.method,
            status_code: usage.status_code,
            response_time_ms: usage.response_time_ms,
            tokens_used: usage.tokens_used,
            bigquery_bytes: usage.bigquery_bytes,
            auth_type: usage.auth_type,
            api_key_id: usage.api_key_id,
            ip_address: usage.ip_address,
            created_at: usage.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsagePage {
    pub total: u64,
    pub records: Vec<UsageResponse>,
}

pub type StatsResponse = PlatformStats;

// ==================== SERVICE ====================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub app_name: String,
    pub version: String,
    pub environment: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub docs: String,
}
