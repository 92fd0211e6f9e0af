use axum::{
    extract::State,
    http::{HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::dto::{HealthResponse, RootResponse};
use super::error::ApiError;
use super::handlers::{admin, api_keys, auth, conversations, memory, projects, queries};
use super::openapi::ApiDoc;
use super::rate_limiter::{rate_limit_middleware, RateLimiter};
use super::usage::track_usage;
use crate::auth::TokenService;
use crate::config::Config;
use crate::pipeline::QueryPipeline;
use crate::services::{AnthropicClient, LlmError};
use crate::storage::Repository;

pub const DOCS_PATH: &str = "/api/docs";
pub const OPENAPI_PATH: &str = "/api/openapi.json";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: Arc<dyn Repository>,
    pub tokens: Arc<TokenService>,
    pub pipeline: Arc<QueryPipeline>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, repo: Arc<dyn Repository>) -> Result<Self, LlmError> {
        let llm = Arc::new(AnthropicClient::new(
            config.anthropic_api_url.clone(),
            config.anthropic_api_key.clone(),
        )?);
        let pipeline = QueryPipeline::new(
            repo.clone(),
            llm,
            config.llm_max_tokens,
            config.bigquery_api_url.clone(),
            config.query_timeout_secs,
        );

        Ok(Self {
            tokens: Arc::new(TokenService::from_config(&config)),
            rate_limiter: RateLimiter::new(config.rate_limit_per_minute, config.rate_limit_per_day),
            pipeline: Arc::new(pipeline),
            repo,
            config: Arc::new(config),
        })
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route(
            "/auth/api-keys",
            post(api_keys::create_api_key).get(api_keys::list_api_keys),
        )
        .route("/auth/api-keys/{id}", delete(api_keys::revoke_api_key))
        // Projects
        .route(
            "/projects",
            post(projects::create_project).get(projects::list_projects),
        )
        .route(
            "/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/{id}/bigquery/connect", post(projects::connect_bigquery))
        .route("/projects/{id}/bigquery/schema", get(projects::get_schema))
        .route("/projects/{id}/bigquery/refresh", post(projects::refresh_schema))
        .route("/projects/{id}/bigquery/validate", post(projects::validate_sql))
        // Memory
        .route(
            "/projects/{id}/memory",
            get(memory::list_memory).post(memory::create_memory),
        )
        .route(
            "/projects/{id}/memory/{memory_id}",
            put(memory::update_memory).delete(memory::delete_memory),
        )
        .route(
            "/projects/{id}/instructions",
            get(memory::list_instructions).post(memory::create_instruction),
        )
        .route(
            "/projects/{id}/instructions/{instruction_id}",
            put(memory::update_instruction).delete(memory::delete_instruction),
        )
        // Conversations
        .route(
            "/projects/{id}/conversations",
            post(conversations::create_conversation).get(conversations::list_conversations),
        )
        .route(
            "/conversations/{id}",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        // Queries
        .route("/queries/ask", post(queries::ask))
        .route("/queries/execute-sql", post(queries::execute_sql))
        .route("/queries/history", get(queries::history))
        // Admin
        .route("/admin/logs/queries", get(admin::query_logs))
        .route("/admin/logs/errors", get(admin::error_logs))
        .route("/admin/logs/errors/{id}/resolve", put(admin::resolve_error))
        .route("/admin/usage", get(admin::usage))
        .route("/admin/stats", get(admin::stats))
        .route(
            "/admin/instructions",
            get(admin::list_global_instructions).post(admin::create_global_instruction),
        )
        .route(
            "/admin/instructions/{id}",
            put(admin::update_global_instruction).delete(admin::delete_global_instruction),
        )
}

/// Rate limiting outermost, then usage tracking, then panic recovery.
fn with_api_layers(routes: Router<AppState>, state: &AppState) -> Router<AppState> {
    routes
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(state.clone(), track_usage))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
}

/// Builds the full application: `/api/v1` (rate limited, usage tracked),
/// service endpoints and the OpenAPI UI.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", with_api_layers(api_routes(), &state))
        .route("/health", get(health))
        .route("/", get(root))
        .merge(SwaggerUi::new(DOCS_PATH).url(OPENAPI_PATH, ApiDoc::openapi()))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "handler panicked".to_string());
    ApiError::internal(format!("Unhandled panic: {}", message)).into_response()
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        app_name: state.config.app_name.clone(),
        version: state.config.app_version.clone(),
        environment: state.config.environment.clone(),
    })
}

#[utoipa::path(
    get,
    path = "/",
    tag = "service",
    responses((status = 200, description = "Welcome message", body = RootResponse))
)]
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("Welcome to {} API", state.config.app_name),
        version: state.config.app_version.clone(),
        docs: DOCS_PATH.to_string(),
    })
}
