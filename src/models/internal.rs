use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

// ==================== WAREHOUSE SCHEMA ====================

/// Cached dataset schema keyed by table id.
pub type SchemaCache = BTreeMap<String, TableSchema>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
    pub row_count: Option<i64>,
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Name/type pair describing one column of a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

// ==================== QUERY RESULTS ====================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResult {
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Map<String, Value>>,
    pub schema: Vec<FieldSchema>,
    pub rows_returned: usize,
    pub execution_time_ms: u64,
    pub bytes_processed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DryRunResult {
    pub valid: bool,
    pub error: Option<String>,
    pub estimated_bytes: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlGeneration {
    pub sql: String,
    pub tokens_used: u32,
    pub generation_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Metric,
    Line,
    Bar,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChartSuggestion {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
}

impl ChartSuggestion {
    pub fn new(kind: ChartKind, title: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
        }
    }
}

// ==================== STATUS VALUES ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Jwt,
    ApiKey,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Jwt => "jwt",
            AuthType::ApiKey => "api_key",
        }
    }
}

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

// ==================== WRITE RECORDS ====================

/// Query log row as it is built up while a question moves through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct QueryLogEntry {
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
}

#[derive(Debug, Clone)]
pub struct ErrorLogEntry {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub error_type: String,
    pub error_message: String,
    pub endpoint: Option<String>,
    pub request_payload: Option<Value>,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct UsageEntry {
    pub user_id: Option<Uuid>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: i32,
    pub tokens_used: i32,
    pub bigquery_bytes: i64,
    pub auth_type: Option<AuthType>,
    pub api_key_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub user_id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub scopes: Vec<String>,
    pub rate_limit_per_minute: i32,
    pub rate_limit_per_day: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Aggregate counters for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PlatformStats {
    pub total_users: u64,
    pub total_projects: u64,
    pub total_queries: u64,
    pub failed_queries: u64,
    pub unresolved_errors: u64,
    pub total_tokens: i64,
    pub total_bytes_processed: i64,
}

// ==================== REPOSITORY INPUTS ====================

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub bigquery_project_id: Option<String>,
    pub bigquery_dataset: Option<String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub bigquery_project_id: Option<String>,
    pub bigquery_dataset: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub hashed_password: Option<String>,
    pub preferences: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct NewInstruction {
    pub instruction_text: String,
    pub category: Option<String>,
    pub priority: i32,
}

#[derive(Debug, Clone, Default)]
pub struct InstructionChanges {
    pub instruction_text: Option<String>,
    pub category: Option<String>,
    pub priority: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct NewMemoryItem {
    pub memory_type: String,
    pub key: String,
    pub content: String,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryItemChanges {
    pub memory_type: Option<String>,
    pub key: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryLogFilter {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub execution_status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorLogFilter {
    pub resolved: Option<bool>,
    pub severity: Option<String>,
}
