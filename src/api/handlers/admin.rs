//! Superuser-only endpoints: audit logs, usage, platform stats and the
//! global instruction tier.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{not_found_as, page_offset, page_size};
use crate::api::dto::{
    CreateGlobalInstructionRequest, ErrorLogPage, ErrorLogParams, ErrorLogResponse,
    GlobalInstructionResponse, PageParams, QueryLogPage, QueryLogParams, StatsResponse,
    UpdateGlobalInstructionRequest, UsagePage,
};
use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ValidJson;
use crate::api::routes::AppState;
use crate::auth::Superuser;
use crate::models::internal::{ErrorLogFilter, InstructionChanges, NewInstruction, QueryLogFilter};

#[utoipa::path(
    get,
    path = "/api/v1/admin/logs/queries",
    tag = "admin",
    params(QueryLogParams),
    responses(
        (status = 200, description = "Query logs of all users, newest first", body = QueryLogPage),
        (status = 403, description = "Not enough permissions", body = ErrorResponse)
    )
)]
pub async fn query_logs(
    State(state): State<AppState>,
    _admin: Superuser,
    Query(params): Query<QueryLogParams>,
) -> ApiResult<Json<QueryLogPage>> {
    let filter = QueryLogFilter {
        user_id: params.user_id,
        project_id: params.project_id,
        execution_status: params.status,
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

#[utoipa::path(
    get,
    path = "/api/v1/admin/logs/errors",
    tag = "admin",
    params(ErrorLogParams),
    responses(
        (status = 200, description = "Error logs, newest first", body = ErrorLogPage),
        (status = 403, description = "Not enough permissions", body = ErrorResponse)
    )
)]
pub async fn error_logs(
    State(state): State<AppState>,
    _admin: Superuser,
    Query(params): Query<ErrorLogParams>,
) -> ApiResult<Json<ErrorLogPage>> {
    let filter = ErrorLogFilter {
        resolved: params.resolved,
        severity: params.severity,
    };
    let (logs, total) = state
        .repo
        .list_error_logs(filter, page_size(params.limit), page_offset(params.offset))
        .await?;

    Ok(Json(ErrorLogPage {
        total,
        logs: logs.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/logs/errors/{id}/resolve",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Error log id")),
    responses(
        (status = 200, description = "Error marked resolved", body = ErrorLogResponse),
        (status = 404, description = "Error log not found", body = ErrorResponse)
    )
)]
pub async fn resolve_error(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ErrorLogResponse>> {
    let log = state
        .repo
        .resolve_error_log(id, admin.id())
        .await
        .map_err(not_found_as("Error log not found"))?;
    tracing::info!("Error log {} resolved by {}", id, admin.user.email);
    Ok(Json(log.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/usage",
    tag = "admin",
    params(PageParams),
    responses((status = 200, description = "Per-request usage records, newest first", body = UsagePage))
)]
pub async fn usage(
    State(state): State<AppState>,
    _admin: Superuser,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<UsagePage>> {
    let (records, total) = state
        .repo
        .list_usage(page_size(params.limit), page_offset(params.offset))
        .await?;

    Ok(Json(UsagePage {
        total,
        records: records.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    tag = "admin",
    responses((status = 200, description = "Platform totals", body = StatsResponse))
)]
pub async fn stats(
    State(state): State<AppState>,
    _admin: Superuser,
) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(state.repo.platform_stats().await?))
}

// ==================== GLOBAL INSTRUCTIONS ====================

#[utoipa::path(
    get,
    path = "/api/v1/admin/instructions",
    tag = "admin",
    responses((status = 200, description = "All global instructions", body = [GlobalInstructionResponse]))
)]
pub async fn list_global_instructions(
    State(state): State<AppState>,
    _admin: Superuser,
) -> ApiResult<Json<Vec<GlobalInstructionResponse>>> {
    let instructions = state.repo.list_global_instructions(false).await?;
    Ok(Json(instructions.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/instructions",
    tag = "admin",
    request_body = CreateGlobalInstructionRequest,
    responses((status = 201, description = "Instruction created", body = GlobalInstructionResponse))
)]
pub async fn create_global_instruction(
    State(state): State<AppState>,
    _admin: Superuser,
    ValidJson(req): ValidJson<CreateGlobalInstructionRequest>,
) -> ApiResult<(StatusCode, Json<GlobalInstructionResponse>)> {
    let instruction = state
        .repo
        .create_global_instruction(NewInstruction {
            instruction_text: req.instruction_text,
            category: req.category,
            priority: req.priority,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(instruction.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/instructions/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Instruction id")),
    request_body = UpdateGlobalInstructionRequest,
    responses(
        (status = 200, description = "Updated instruction", body = GlobalInstructionResponse),
        (status = 404, description = "Instruction not found", body = ErrorResponse)
    )
)]
pub async fn update_global_instruction(
    State(state): State<AppState>,
    _admin: Superuser,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateGlobalInstructionRequest>,
) -> ApiResult<Json<GlobalInstructionResponse>> {
    let instruction = state
        .repo
        .update_global_instruction(
            id,
            InstructionChanges {
                instruction_text: req.instruction_text,
                category: req.category,
                priority: req.priority,
                active: req.active,
            },
        )
        .await
        .map_err(not_found_as("Instruction not found"))?;
    Ok(Json(instruction.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/instructions/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Instruction id")),
    responses(
        (status = 204, description = "Instruction deleted"),
        (status = 404, description = "Instruction not found", body = ErrorResponse)
    )
)]
pub async fn delete_global_instruction(
    State(state): State<AppState>,
    _admin: Superuser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .repo
        .delete_global_instruction(id)
        .await
        .map_err(not_found_as("Instruction not found"))?;
    Ok(StatusCode::NO_CONTENT)
}
