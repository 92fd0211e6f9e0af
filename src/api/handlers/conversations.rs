use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::owned_project;
use crate::api::dto::{
    ConversationDetailResponse, ConversationResponse, CreateConversationRequest, MessageResponse,
};
use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::routes::AppState;
use crate::auth::CurrentUser;
use crate::models::Conversation;

/// The caller's conversation, or 404 "Conversation not found".
async fn owned_conversation(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
) -> Result<Conversation, ApiError> {
    state
        .repo
        .find_conversation(id)
        .await?
        .filter(|conv| conv.user_id == user.id())
        .ok_or_else(|| ApiError::not_found("Conversation not found"))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/conversations",
    tag = "conversations",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body(content = CreateConversationRequest, description = "Optional title"),
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    body: Option<Json<CreateConversationRequest>>,
) -> ApiResult<(StatusCode, Json<ConversationResponse>)> {
    owned_project(&state, &user, project_id).await?;
    let Json(req) = body.unwrap_or_default();
    let conversation = state
        .repo
        .create_conversation(project_id, user.id(), req.title)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/conversations",
    tag = "conversations",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "The caller's conversations, most recent first", body = [ConversationResponse]),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ConversationResponse>>> {
    owned_project(&state, &user, project_id).await?;
    let conversations = state.repo.list_conversations(project_id, user.id()).await?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}",
    tag = "conversations",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation with its messages", body = ConversationDetailResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConversationDetailResponse>> {
    let conversation = owned_conversation(&state, &user, id).await?;
    let messages = state.repo.list_messages(conversation.id).await?;
    Ok(Json(ConversationDetailResponse {
        conversation: conversation.into(),
        messages: messages.into_iter().map(MessageResponse::from).collect(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/conversations/{id}",
    tag = "conversations",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 204, description = "Conversation and messages deleted"),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    )
)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let conversation = owned_conversation(&state, &user, id).await?;
    state.repo.delete_conversation(conversation.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
