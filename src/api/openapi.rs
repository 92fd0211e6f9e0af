use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::dto::*;
use super::error::ErrorResponse;
use super::handlers::{admin, api_keys, auth, conversations, memory, projects, queries};
use super::routes;
use crate::auth::API_KEY_HEADER;
use crate::models::internal::{
    ChartKind, ChartSuggestion, ColumnSchema, DryRunResult, ExecutionResult, FieldSchema,
    PlatformStats, TableSchema,
};
use crate::pipeline::{DirectOutcome, QueryOutcome};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TalkToData API",
        description = "Ask questions about BigQuery data in plain language"
    ),
    paths(
        routes::health,
        routes::root,
        auth::register,
        auth::login,
        auth::refresh,
        auth::me,
        auth::update_me,
        api_keys::create_api_key,
        api_keys::list_api_keys,
        api_keys::revoke_api_key,
        projects::create_project,
        projects::list_projects,
        projects::get_project,
        projects::update_project,
        projects::delete_project,
        projects::connect_bigquery,
        projects::get_schema,
        projects::refresh_schema,
        projects::validate_sql,
        memory::list_memory,
        memory::create_memory,
        memory::update_memory,
        memory::delete_memory,
        memory::list_instructions,
        memory::create_instruction,
        memory::update_instruction,
        memory::delete_instruction,
        conversations::create_conversation,
        conversations::list_conversations,
        conversations::get_conversation,
        conversations::delete_conversation,
        queries::ask,
        queries::execute_sql,
        queries::history,
        admin::query_logs,
        admin::error_logs,
        admin::resolve_error,
        admin::usage,
        admin::stats,
        admin::list_global_instructions,
        admin::create_global_instruction,
        admin::update_global_instruction,
        admin::delete_global_instruction,
    ),
    components(schemas(
        ErrorResponse,
        RegisterRequest,
        LoginRequest,
        RefreshRequest,
        UpdateUserRequest,
        TokenResponse,
        UserResponse,
        CreateApiKeyRequest,
        ApiKeyResponse,
        CreatedApiKeyResponse,
        CreateProjectRequest,
        UpdateProjectRequest,
        ProjectResponse,
        BigQueryCredentialsRequest,
        ConnectResponse,
        RefreshSchemaResponse,
        ValidateSqlRequest,
        DryRunResult,
        TableSchema,
        ColumnSchema,
        CreateGlobalInstructionRequest,
        UpdateGlobalInstructionRequest,
        GlobalInstructionResponse,
        CreateMemoryRequest,
        UpdateMemoryRequest,
        MemoryResponse,
        CreateProjectInstructionRequest,
        UpdateProjectInstructionRequest,
        ProjectInstructionResponse,
        CreateConversationRequest,
        ConversationResponse,
        MessageResponse,
        ConversationDetailResponse,
        AskRequest,
        ExecuteSqlRequest,
        QueryOutcome,
        DirectOutcome,
        ExecutionResult,
        FieldSchema,
        ChartKind,
        ChartSuggestion,
        QueryLogResponse,
        QueryLogPage,
        ErrorLogResponse,
        ErrorLogPage,
        UsageResponse,
        UsagePage,
        PlatformStats,
        HealthResponse,
        RootResponse,
    )),
    modifiers(&SecurityAddon),
    security(("bearer" = []), ("api_key" = [])),
    tags(
        (name = "authentication", description = "Registration, tokens and API keys"),
        (name = "projects", description = "Projects and their BigQuery connection"),
        (name = "memory", description = "Project memory and instructions"),
        (name = "conversations", description = "Conversation threads"),
        (name = "queries", description = "Natural-language and direct SQL queries"),
        (name = "admin", description = "Audit logs, usage and global instructions"),
        (name = "service", description = "Health and metadata"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
    }
}
