use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::api::dto::{ApiKeyResponse, CreateApiKeyRequest, CreatedApiKeyResponse};
use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::extract::ValidJson;
use crate::api::routes::AppState;
use crate::auth::{api_key_prefix, generate_api_key, hash_api_key, CurrentUser};
use crate::models::internal::NewApiKey;
use crate::storage::repository::RepositoryError;

#[utoipa::path(
    post,
    path = "/api/v1/auth/api-keys",
    tag = "authentication",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key created; the plaintext key is only shown here", body = CreatedApiKeyResponse)
    )
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidJson(req): ValidJson<CreateApiKeyRequest>,
) -> ApiResult<(StatusCode, Json<CreatedApiKeyResponse>)> {
    let key = generate_api_key();
    let record = state
        .repo
        .create_api_key(NewApiKey {
            user_id: user.id(),
            name: req.name,
            key_hash: hash_api_key(&key),
            key_prefix: api_key_prefix(&key),
            scopes: req.scopes,
            rate_limit_per_minute: state.config.rate_limit_per_minute as i32,
            rate_limit_per_day: state.config.rate_limit_per_day as i32,
            expires_at: req.expires_in_days.map(|days| Utc::now() + Duration::days(days)),
        })
        .await?;

    tracing::info!("API key {} created for user {}", record.key_prefix, user.id());
    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKeyResponse {
            key,
            api_key: record.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/api-keys",
    tag = "authentication",
    responses((status = 200, description = "Keys of the current user", body = [ApiKeyResponse]))
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<ApiKeyResponse>>> {
    let keys = state.repo.list_api_keys(user.id()).await?;
    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/auth/api-keys/{id}",
    tag = "authentication",
    params(("id" = Uuid, Path, description = "API key id")),
    responses(
        (status = 204, description = "Key deactivated"),
        (status = 404, description = "API key not found", body = ErrorResponse)
    )
)]
pub async fn revoke_api_key(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    match state.repo.deactivate_api_key(user.id(), id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(RepositoryError::NotFound(_)) => Err(ApiError::not_found("API key not found")),
        Err(e) => Err(e.into()),
    }
}
