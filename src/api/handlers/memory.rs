use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{not_found_as, owned_project};
use crate::api::dto::{
    CreateMemoryRequest, CreateProjectInstructionRequest, MemoryResponse,
    ProjectInstructionResponse, UpdateMemoryRequest, UpdateProjectInstructionRequest,
};
use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ValidJson;
use crate::api::routes::AppState;
use crate::auth::CurrentUser;
use crate::models::internal::{
    InstructionChanges, MemoryItemChanges, NewInstruction, NewMemoryItem,
};

const MEMORY_NOT_FOUND: &str = "Memory item not found";
const INSTRUCTION_NOT_FOUND: &str = "Instruction not found";

// ==================== PROJECT MEMORY ====================

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/memory",
    tag = "memory",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Business rules and domain knowledge", body = [MemoryResponse]),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn list_memory(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemoryResponse>>> {
    owned_project(&state, &user, project_id).await?;
    let items = state.repo.list_memory_items(project_id).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/memory",
    tag = "memory",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = CreateMemoryRequest,
    responses(
        (status = 201, description = "Memory item created", body = MemoryResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn create_memory(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ValidJson(req): ValidJson<CreateMemoryRequest>,
) -> ApiResult<(StatusCode, Json<MemoryResponse>)> {
    owned_project(&state, &user, project_id).await?;
    let item = state
        .repo
        .create_memory_item(
            project_id,
            NewMemoryItem {
                memory_type: req.memory_type,
                key: req.key,
                content: req.content,
                created_by: Some(user.id()),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}/memory/{memory_id}",
    tag = "memory",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("memory_id" = Uuid, Path, description = "Memory item id")
    ),
    request_body = UpdateMemoryRequest,
    responses(
        (status = 200, description = "Updated memory item", body = MemoryResponse),
        (status = 404, description = "Project or memory item not found", body = ErrorResponse)
    )
)]
pub async fn update_memory(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, memory_id)): Path<(Uuid, Uuid)>,
    ValidJson(req): ValidJson<UpdateMemoryRequest>,
) -> ApiResult<Json<MemoryResponse>> {
    owned_project(&state, &user, project_id).await?;
    let item = state
        .repo
        .update_memory_item(
            project_id,
            memory_id,
            MemoryItemChanges {
                memory_type: req.memory_type,
                key: req.key,
                content: req.content,
            },
        )
        .await
        .map_err(not_found_as(MEMORY_NOT_FOUND))?;
    Ok(Json(item.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}/memory/{memory_id}",
    tag = "memory",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("memory_id" = Uuid, Path, description = "Memory item id")
    ),
    responses(
        (status = 204, description = "Memory item deleted"),
        (status = 404, description = "Project or memory item not found", body = ErrorResponse)
    )
)]
pub async fn delete_memory(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, memory_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    owned_project(&state, &user, project_id).await?;
    state
        .repo
        .delete_memory_item(project_id, memory_id)
        .await
        .map_err(not_found_as(MEMORY_NOT_FOUND))?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== PROJECT INSTRUCTIONS ====================

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/instructions",
    tag = "memory",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "All project instructions, active or not", body = [ProjectInstructionResponse]),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn list_instructions(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ProjectInstructionResponse>>> {
    owned_project(&state, &user, project_id).await?;
    let instructions = state.repo.list_project_instructions(project_id, false).await?;
    Ok(Json(instructions.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/instructions",
    tag = "memory",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = CreateProjectInstructionRequest,
    responses(
        (status = 201, description = "Instruction created", body = ProjectInstructionResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn create_instruction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ValidJson(req): ValidJson<CreateProjectInstructionRequest>,
) -> ApiResult<(StatusCode, Json<ProjectInstructionResponse>)> {
    owned_project(&state, &user, project_id).await?;
    let instruction = state
        .repo
        .create_project_instruction(
            project_id,
            NewInstruction {
                instruction_text: req.instruction_text,
                category: None,
                priority: req.priority,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(instruction.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}/instructions/{instruction_id}",
    tag = "memory",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("instruction_id" = Uuid, Path, description = "Instruction id")
    ),
    request_body = UpdateProjectInstructionRequest,
    responses(
        (status = 200, description = "Updated instruction", body = ProjectInstructionResponse),
        (status = 404, description = "Project or instruction not found", body = ErrorResponse)
    )
)]
pub async fn update_instruction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, instruction_id)): Path<(Uuid, Uuid)>,
    ValidJson(req): ValidJson<UpdateProjectInstructionRequest>,
) -> ApiResult<Json<ProjectInstructionResponse>> {
    owned_project(&state, &user, project_id).await?;
    let instruction = state
        .repo
        .update_project_instruction(
            project_id,
            instruction_id,
            InstructionChanges {
                instruction_text: req.instruction_text,
                category: None,
                priority: req.priority,
                active: req.active,
            },
        )
        .await
        .map_err(not_found_as(INSTRUCTION_NOT_FOUND))?;
    Ok(Json(instruction.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}/instructions/{instruction_id}",
    tag = "memory",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("instruction_id" = Uuid, Path, description = "Instruction id")
    ),
    responses(
        (status = 204, description = "Instruction deleted"),
        (status = 404, description = "Project or instruction not found", body = ErrorResponse)
    )
)]
pub async fn delete_instruction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, instruction_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    owned_project(&state, &user, project_id).await?;
    state
        .repo
        .delete_project_instruction(project_id, instruction_id)
        .await
        .map_err(not_found_as(INSTRUCTION_NOT_FOUND))?;
    Ok(StatusCode::NO_CONTENT)
}
