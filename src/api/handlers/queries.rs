use axum::{
    extract::{Query, State},
    Json,
};
use uuid::Uuid;

use super::{owned_project, page_offset, page_size};
use crate::api::client::ClientInfo;
use crate::api::dto::{AskRequest, ExecuteSqlRequest, HistoryParams, QueryLogPage};
use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::extract::ValidJson;
use crate::api::routes::AppState;
use crate::api::usage::UsageContext;
use crate::auth::CurrentUser;
use crate::models::internal::QueryLogFilter;
use crate::models::Project;
use crate::pipeline::{DirectOutcome, QueryOutcome, Question};

const NOT_CONFIGURED: &str = "BigQuery not configured for this project";

fn ensure_configured(project: &Project) -> Result<(), ApiError> {
    let configured = project
        .credentials_json
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if configured {
        Ok(())
    } else {
        Err(ApiError::bad_request(NOT_CONFIGURED))
    }
}

/// The conversation must exist, belong to the project and to the caller.
async fn check_conversation(
    state: &AppState,
    user: &CurrentUser,
    project_id: Uuid,
    conversation_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let Some(id) = conversation_id else {
        return Ok(());
    };
    state
        .repo
        .find_conversation(id)
        .await?
        .filter(|conv| conv.project_id == project_id && conv.user_id == user.id())
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("Conversation not found"))
}

#[utoipa::path(
    post,
    path = "/api/v1/queries/ask",
    tag = "queries",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Generated SQL, rows, insights and chart suggestion", body = QueryOutcome),
        (status = 400, description = "Generation or execution failed", body = ErrorResponse),
        (status = 404, description = "Project or conversation not found", body = ErrorResponse)
    )
)]
pub async fn ask(
    State(state): State<AppState>,
    user: CurrentUser,
    usage: UsageContext,
    client: ClientInfo,
    ValidJson(req): ValidJson<AskRequest>,
) -> ApiResult<Json<QueryOutcome>> {
    let project = owned_project(&state, &user, req.project_id).await?;
    usage.set_project(project.id);
    ensure_configured(&project)?;
    check_conversation(&state, &user, project.id, req.conversation_id).await?;

    if req.stream {
        tracing::debug!("Streaming requested; returning a complete response");
    }
    let model = req
        .model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(&state.config.default_model);

    let outcome = state
        .pipeline
        .process_question(Question {
            project: &project,
            user_id: user.id(),
            text: &req.question,
            conversation_id: req.conversation_id,
            model,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await;

    usage.add_tokens(i64::from(outcome.tokens_used));
    if let Some(result) = &outcome.result {
        usage.add_bytes(result.bytes_processed);
    }

    match outcome.error {
        Some(detail) => Err(ApiError::bad_request(detail)),
        None => Ok(Json(outcome)),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/queries/execute-sql",
    tag = "queries",
    request_body = ExecuteSqlRequest,
    responses(
        (status = 200, description = "Rows returned by the statement", body = DirectOutcome),
        (status = 400, description = "Forbidden SQL or execution failed", body = ErrorResponse),
        (status = 404, description = "Project or conversation not found", body = ErrorResponse)
    )
)]
pub async fn execute_sql(
    State(state): State<AppState>,
    user: CurrentUser,
    usage: UsageContext,
    ValidJson(req): ValidJson<ExecuteSqlRequest>,
) -> ApiResult<Json<DirectOutcome>> {
    let project = owned_project(&state, &user, req.project_id).await?;
    usage.set_project(project.id);
    ensure_configured(&project)?;
    check_conversation(&state, &user, project.id, req.conversation_id).await?;

    let outcome = state.pipeline.execute_sql_directly(&project, &req.sql).await;
    if let Some(result) = &outcome.result {
        usage.add_bytes(result.bytes_processed);
    }

    match outcome.error {
        Some(detail) => Err(ApiError::bad_request(detail)),
        None => Ok(Json(outcome)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/queries/history",
    tag = "queries",
    params(HistoryParams),
    responses((status = 200, description = "The caller's query log, newest first", body = QueryLogPage))
)]
pub async fn history(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<QueryLogPage>> {
    let filter = QueryLogFilter {
        user_id: Some(user.id()),
        project_id: params.project_id,
        execution_status: None,
    };
    let (logs, total) = state
        .repo
        .list_query_logs(filter, page_size(params.limit), page_offset(params.offset))
        .await?;

    Ok(Json(QueryLogPage {
        total,
        logs: logs.into_iter().map(Into::into).collect(),
    }))
}
